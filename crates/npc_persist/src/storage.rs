//! Keyed snapshot storage backends.
//!
//! A [`SnapshotStorage`] maps a scenario key to one opaque document. Two
//! backends are provided: [`MemoryStorage`] for tests and throwaway sessions,
//! and [`FileStorage`], which keeps one `<key>.json` per scenario.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PersistenceError;

/// Durable keyed storage for snapshot documents.
pub trait SnapshotStorage: fmt::Debug + Send {
    /// Read the document stored under `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the key is invalid or the read fails.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Replace the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the key is invalid or the write fails.
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError>;
}

/// Check that a scenario key is usable as a file stem.
///
/// # Errors
///
/// Returns [`PersistenceError::InvalidKey`] for an empty key or one with
/// characters outside `[A-Za-z0-9_-]`.
pub fn validate_key(key: &str) -> Result<(), PersistenceError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidKey(key.to_string()))
    }
}

/// Snapshots held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        validate_key(key)?;
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Snapshots stored as `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
///
/// Reads and writes are blocking `std::fs` calls made on the caller's
/// thread. Inside the bridge that is the runtime task itself, which stalls
/// command handling for the length of one small write. Large rosters should
/// wrap this backend in one that hands writes to `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Store snapshots under `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a key is stored in.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidKey`] for an unusable key.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SnapshotStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }
}
