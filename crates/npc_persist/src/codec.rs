//! JSON snapshot codec.
//!
//! A snapshot is a JSON array, one object per entity, in store order:
//!
//! ```json
//! [{"id": "npc-1", "name": "Mira", "position": [120.0, 48.5], "status": "idle", "map": "harbor"}]
//! ```
//!
//! Movement is never written: a moving entity is stored idle at its last
//! computed position. Decoding is per record, so one bad entry does not cost
//! the rest of the file.

use std::collections::HashSet;

use npc_math::DVec2;
use npc_position::{EntityId, EntitySnapshot, MapId, MovementStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::PersistenceError;

/// One persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntity {
    pub id: EntityId,
    pub name: String,
    pub position: [f64; 2],
    /// Always [`MovementStatus::Idle`] when written by this crate.
    pub status: MovementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MapId>,
}

impl PersistedEntity {
    /// Build the persisted form of a snapshot, coercing movement to idle.
    #[must_use]
    pub fn from_snapshot(snapshot: &EntitySnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            name: snapshot.display_name.clone(),
            position: snapshot.position.to_array(),
            status: MovementStatus::Idle,
            map: snapshot.map.clone(),
        }
    }

    #[must_use]
    pub fn position(&self) -> DVec2 {
        DVec2::from_array(self.position)
    }
}

/// Records recovered from a snapshot document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSnapshot {
    /// Valid records, in document order, first occurrence of each id.
    pub entities: Vec<PersistedEntity>,
    /// Entries that were malformed, had an empty id or non-finite
    /// position, or repeated an earlier id.
    pub skipped: usize,
}

/// Encode entity snapshots to JSON bytes.
///
/// # Errors
///
/// Returns [`PersistenceError::Encode`] if serialisation fails.
pub fn encode_snapshot(entities: &[EntitySnapshot]) -> Result<Vec<u8>, PersistenceError> {
    let records: Vec<PersistedEntity> = entities.iter().map(PersistedEntity::from_snapshot).collect();
    serde_json::to_vec_pretty(&records).map_err(PersistenceError::Encode)
}

/// Decode a snapshot document, skipping entries that cannot be used.
///
/// # Errors
///
/// Returns [`PersistenceError::Decode`] only if the document as a whole is
/// not a JSON array.
pub fn decode_snapshot(bytes: &[u8]) -> Result<DecodedSnapshot, PersistenceError> {
    let entries: Vec<Value> = serde_json::from_slice(bytes).map_err(PersistenceError::Decode)?;

    let mut decoded = DecodedSnapshot::default();
    let mut seen = HashSet::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let record: PersistedEntity = match serde_json::from_value(entry) {
            Ok(record) => record,
            Err(e) => {
                warn!(index, error = %e, "skipping unreadable snapshot record");
                decoded.skipped += 1;
                continue;
            }
        };

        if record.id.as_str().is_empty() || !record.position().is_finite() {
            warn!(index, id = %record.id, "skipping invalid snapshot record");
            decoded.skipped += 1;
            continue;
        }

        if !seen.insert(record.id.clone()) {
            warn!(index, id = %record.id, "skipping duplicate snapshot record");
            decoded.skipped += 1;
            continue;
        }

        decoded.entities.push(record);
    }

    Ok(decoded)
}
