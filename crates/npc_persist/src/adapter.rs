//! Save and restore a position store under a scenario key.
//!
//! [`PersistenceAdapter`] is deliberately forgiving. A failed save or an
//! unreadable snapshot is logged and the game keeps running on the in-memory
//! store; nothing here ever returns an error to gameplay code.

use npc_position::{MovementStatus, PositionStore};
use tracing::{debug, error, info, warn};

use crate::codec::{self, DecodedSnapshot};
use crate::error::PersistenceError;
use crate::storage::{self, SnapshotStorage};

/// Summary of a [`PersistenceAdapter::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entities written into the store.
    pub restored: usize,
    /// Entries that could not be used.
    pub skipped: usize,
}

/// Writes store snapshots to keyed storage and reads them back.
#[derive(Debug)]
pub struct PersistenceAdapter {
    storage: Box<dyn SnapshotStorage>,
    key: String,
}

impl PersistenceAdapter {
    /// Persist under `key` in `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidKey`] if `key` cannot be used.
    pub fn new(
        storage: impl SnapshotStorage + 'static,
        key: impl Into<String>,
    ) -> Result<Self, PersistenceError> {
        let key = key.into();
        storage::validate_key(&key)?;
        Ok(Self {
            storage: Box::new(storage),
            key,
        })
    }

    /// The scenario key snapshots are stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn storage(&self) -> &dyn SnapshotStorage {
        self.storage.as_ref()
    }

    /// Write the current store, logging any failure.
    ///
    /// Returns `true` if the snapshot was written.
    pub fn save(&mut self, store: &PositionStore) -> bool {
        match self.try_save(store) {
            Ok(count) => {
                debug!(key = self.key, entities = count, "snapshot saved");
                true
            }
            Err(e) => {
                error!(key = self.key, error = %e, "failed to save snapshot; continuing in memory");
                false
            }
        }
    }

    /// Write the current store. Returns how many entities were written.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if encoding or the storage write fails.
    pub fn try_save(&mut self, store: &PositionStore) -> Result<usize, PersistenceError> {
        let entities = store.get_all();
        let bytes = codec::encode_snapshot(&entities)?;
        self.storage.write(&self.key, &bytes)?;
        Ok(entities.len())
    }

    /// Restore the stored snapshot into `store`, logging any failure.
    ///
    /// Entries are upserted as idle entities; records already in the store
    /// that are not in the snapshot are left alone. A missing snapshot is an
    /// empty, successful load.
    pub fn load(&self, store: &mut PositionStore) -> LoadReport {
        let decoded = match self.read() {
            Ok(Some(decoded)) => decoded,
            Ok(None) => {
                info!(key = self.key, "no snapshot to restore");
                return LoadReport::default();
            }
            Err(e) => {
                error!(key = self.key, error = %e, "failed to read snapshot; starting empty");
                return LoadReport::default();
            }
        };

        let mut report = LoadReport {
            restored: 0,
            skipped: decoded.skipped,
        };

        for entity in decoded.entities {
            let position = entity.position();
            let result = match entity.map {
                Some(map) => store.place_on_map(entity.id.clone(), entity.name, position, map),
                None => store.set_position(entity.id.clone(), entity.name, position, MovementStatus::Idle),
            };
            match result {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    warn!(key = self.key, id = %entity.id, error = %e, "skipping snapshot record");
                    report.skipped += 1;
                }
            }
        }

        info!(
            key = self.key,
            restored = report.restored,
            skipped = report.skipped,
            "snapshot restored"
        );
        report
    }

    fn read(&self) -> Result<Option<DecodedSnapshot>, PersistenceError> {
        self.storage
            .read(&self.key)?
            .map(|bytes| codec::decode_snapshot(&bytes))
            .transpose()
    }
}
