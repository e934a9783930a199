//! Runtime error types.

use npc_position::PositionError;

/// Errors returned to callers of a [`BridgeHandle`](crate::BridgeHandle).
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The command was rejected before anything changed.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] PositionError),

    /// The bridge task is no longer running.
    #[error("position bridge has shut down")]
    Closed,
}
