//! The authoritative position store.
//!
//! [`PositionStore`] owns every [`EntityRecord`]. Commands validate their
//! input first and only then mutate, so a rejected command never leaves a
//! partial change behind. Reads hand out [`EntitySnapshot`] copies.

use std::collections::HashMap;

use npc_math::DVec2;
use tracing::{debug, warn};

use crate::error::{CommandOutcome, PositionError};
use crate::record::{
    CompletionCallback, EntityId, EntityRecord, EntitySnapshot, MapId, MovementStatus, Step,
};

/// The canonical set of tracked entities, in insertion order.
#[derive(Debug, Default)]
pub struct PositionStore {
    /// Records in insertion order.
    records: Vec<EntityRecord>,
    /// Maps each id to its index in `records`.
    index: HashMap<EntityId, usize>,
}

impl PositionStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entity, leaving it idle at `position`.
    ///
    /// A moving entity is stopped in place of its move; its pending callback
    /// is dropped without being called. An existing map assignment is kept.
    ///
    /// # Errors
    ///
    /// Rejects an empty id, a non-finite position, or `status == Moving`
    /// (a move needs a target; use [`PositionStore::move_to`]).
    pub fn set_position(
        &mut self,
        id: impl Into<EntityId>,
        name: impl Into<String>,
        position: DVec2,
        status: MovementStatus,
    ) -> Result<(), PositionError> {
        let id = id.into();
        if status == MovementStatus::Moving {
            return Err(PositionError::MovingWithoutPath(id));
        }
        self.upsert(id, name.into(), position, None)
    }

    /// Insert or overwrite an idle entity and assign it to `map`.
    ///
    /// # Errors
    ///
    /// Rejects an empty id or a non-finite position.
    pub fn place_on_map(
        &mut self,
        id: impl Into<EntityId>,
        name: impl Into<String>,
        position: DVec2,
        map: MapId,
    ) -> Result<(), PositionError> {
        self.upsert(id.into(), name.into(), position, Some(map))
    }

    fn upsert(
        &mut self,
        id: EntityId,
        name: String,
        position: DVec2,
        map: Option<MapId>,
    ) -> Result<(), PositionError> {
        if id.as_str().is_empty() {
            return Err(PositionError::EmptyId);
        }
        npc_math::ensure_finite("position", position)?;

        match self.index.get(&id) {
            Some(&idx) => {
                let record = &mut self.records[idx];
                if record.is_moving() {
                    debug!(%id, "position set while moving; move discarded");
                }
                record.reset(name, position, map);
            }
            None => {
                debug!(%id, x = position.x, y = position.y, "entity registered");
                self.index.insert(id.clone(), self.records.len());
                self.records.push(EntityRecord::new(id, name, position, map));
            }
        }
        Ok(())
    }

    /// Returns a copy of one entity, or `None` if it is not tracked.
    #[must_use]
    pub fn get_position(&self, id: &str) -> Option<EntitySnapshot> {
        self.get(id).map(EntityRecord::snapshot)
    }

    /// Borrow a live record.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.index.get(id).map(|&idx| &self.records[idx])
    }

    /// Returns `true` if an entity with this id is tracked.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Copies of every record, in insertion order.
    #[must_use]
    pub fn get_all(&self) -> Vec<EntitySnapshot> {
        self.records.iter().map(EntityRecord::snapshot).collect()
    }

    /// Iterate over the live records, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.iter()
    }

    /// Start moving an entity from its current position towards `target`.
    ///
    /// If the entity is already moving, the new move replaces the old one
    /// and the old callback is dropped without being called. The caller is
    /// responsible for activating the scheduler.
    ///
    /// # Errors
    ///
    /// Rejects a non-finite target. An unknown id is not an error; it is
    /// reported as [`CommandOutcome::NotFound`] and nothing changes.
    pub fn move_to(
        &mut self,
        id: &str,
        target: DVec2,
        on_complete: Option<CompletionCallback>,
    ) -> Result<CommandOutcome, PositionError> {
        npc_math::ensure_finite("target", target)?;

        let Some(&idx) = self.index.get(id) else {
            warn!(id, "move requested for unknown entity");
            return Ok(CommandOutcome::NotFound);
        };

        let record = &mut self.records[idx];
        if record.is_moving() {
            debug!(id, "superseding in-flight move");
        }
        record.begin_move(target, on_complete);
        debug!(
            id,
            from_x = record.position().x,
            from_y = record.position().y,
            to_x = target.x,
            to_y = target.y,
            "move started"
        );
        Ok(CommandOutcome::Applied)
    }

    /// Delete an entity regardless of its state. A pending callback is
    /// dropped without being called.
    pub fn remove(&mut self, id: &str) -> CommandOutcome {
        let Some(idx) = self.index.remove(id) else {
            warn!(id, "remove requested for unknown entity");
            return CommandOutcome::NotFound;
        };

        self.records.remove(idx);
        // Shift the indices of everything after the removed record.
        for record in &self.records[idx..] {
            if let Some(slot) = self.index.get_mut(record.id()) {
                *slot -= 1;
            }
        }
        debug!(id, "entity removed");
        CommandOutcome::Applied
    }

    /// Remove every record. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        self.index.clear();
        debug!(removed, "store cleared");
        removed
    }

    /// Freeze every moving entity where it currently is. Pending callbacks
    /// are dropped without being called. Returns how many were stopped.
    pub fn stop_all(&mut self) -> usize {
        let stopped = self
            .records
            .iter_mut()
            .map(EntityRecord::halt)
            .filter(|&was_moving| was_moving)
            .count();
        debug!(stopped, "all movement stopped");
        stopped
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of entities currently moving.
    #[must_use]
    pub fn moving_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_moving()).count()
    }

    /// Returns `true` if at least one entity is moving.
    #[must_use]
    pub fn has_moving(&self) -> bool {
        self.records.iter().any(EntityRecord::is_moving)
    }

    /// Advance every moving record; the scheduler's only write path.
    pub(crate) fn step_moving(&mut self, speed: f64, dt: f64) -> Vec<(EntityId, DVec2, Step)> {
        self.records
            .iter_mut()
            .filter(|r| r.is_moving())
            .map(|record| {
                let step = record.step(speed, dt);
                (record.id().clone(), record.position(), step)
            })
            .collect()
    }
}
