//! Persistence-layer error types.

/// Errors that can occur while saving or restoring a snapshot.
///
/// None of these reach gameplay code: [`PersistenceAdapter`](crate::PersistenceAdapter)
/// logs them and carries on in memory.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Reading or writing the backing storage failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode a snapshot to JSON.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    /// The stored document is not a JSON array of records.
    #[error("failed to decode snapshot: {0}")]
    Decode(#[source] serde_json::Error),

    /// Scenario keys must be non-empty and use only `[A-Za-z0-9_-]`.
    #[error("invalid snapshot key {0:?}")]
    InvalidKey(String),
}
