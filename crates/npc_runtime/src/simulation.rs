//! The single writer of NPC state.
//!
//! [`Simulation`] ties the position store, the movement scheduler and the
//! persistence adapter together. Every mutating command persists the store
//! once it has succeeded; ticks persist when the last mover comes to rest.

use npc_math::{Bounds, DVec2};
use npc_persist::{LoadReport, PersistenceAdapter};
use npc_position::{
    CommandOutcome, CompletionCallback, EntityId, EntitySnapshot, MapId, MovementConfig,
    MovementScheduler, MovementStatus, PositionError, PositionStore, TickReport,
};
use tracing::{debug, info};

use crate::placement::{self, EntitySeed};

/// Store, scheduler and persistence, owned together.
#[derive(Debug)]
pub struct Simulation {
    /// Validated configuration.
    config: MovementConfig,
    /// The canonical entity state.
    store: PositionStore,
    /// Drives moving entities while active.
    scheduler: MovementScheduler,
    /// Where snapshots go; `None` keeps everything in memory.
    persistence: Option<PersistenceAdapter>,
    /// Source of random placement.
    rng: fastrand::Rng,
}

impl Simulation {
    /// Create an empty, in-memory simulation.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] if `config` fails validation.
    pub fn new(config: MovementConfig) -> Result<Self, PositionError> {
        config.validate()?;
        Ok(Self {
            scheduler: MovementScheduler::from_config(&config)?,
            config,
            store: PositionStore::new(),
            persistence: None,
            rng: fastrand::Rng::new(),
        })
    }

    /// Persist through `adapter`.
    #[must_use]
    pub fn with_persistence(mut self, adapter: PersistenceAdapter) -> Self {
        self.persistence = Some(adapter);
        self
    }

    /// Use a fixed seed for random placement.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    #[must_use]
    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    #[must_use]
    pub fn scheduler(&self) -> &MovementScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn persistence(&self) -> Option<&PersistenceAdapter> {
        self.persistence.as_ref()
    }

    /// Hydrate the store from the last saved snapshot, if any.
    pub fn restore(&mut self) -> LoadReport {
        match &self.persistence {
            Some(adapter) => adapter.load(&mut self.store),
            None => LoadReport::default(),
        }
    }

    /// Write the store now. Returns `true` if a snapshot was written.
    pub fn save(&mut self) -> bool {
        match &mut self.persistence {
            Some(adapter) => adapter.save(&self.store),
            None => false,
        }
    }

    /// See [`PositionStore::set_position`].
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] for rejected input; nothing is changed.
    pub fn set_position(
        &mut self,
        id: impl Into<EntityId>,
        name: impl Into<String>,
        position: DVec2,
        status: MovementStatus,
    ) -> Result<(), PositionError> {
        self.store.set_position(id, name, position, status)?;
        self.save();
        Ok(())
    }

    #[must_use]
    pub fn get_position(&self, id: &str) -> Option<EntitySnapshot> {
        self.store.get_position(id)
    }

    #[must_use]
    pub fn get_all(&self) -> Vec<EntitySnapshot> {
        self.store.get_all()
    }

    /// Start a move and wake the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] for a non-finite target.
    pub fn move_to(
        &mut self,
        id: &str,
        target: DVec2,
        on_complete: Option<CompletionCallback>,
    ) -> Result<CommandOutcome, PositionError> {
        let outcome = self.store.move_to(id, target, on_complete)?;
        if outcome.is_applied() {
            self.scheduler.activate();
        }
        Ok(outcome)
    }

    pub fn remove(&mut self, id: &str) -> CommandOutcome {
        let outcome = self.store.remove(id);
        if outcome.is_applied() {
            self.save();
        }
        outcome
    }

    /// Remove every entity and stop all movement.
    pub fn clear(&mut self) -> usize {
        let removed = self.store.clear();
        self.scheduler.deactivate();
        self.save();
        removed
    }

    /// Freeze every moving entity in place.
    pub fn stop_all(&mut self) -> usize {
        let stopped = self.store.stop_all();
        self.scheduler.deactivate();
        if stopped > 0 {
            self.save();
        }
        stopped
    }

    /// Register every entity in `entities` that is not tracked yet at a
    /// random point inside `bounds` inset by `margin` (or the configured
    /// default margin). Already-tracked entities are untouched.
    ///
    /// Returns the ids that were newly placed.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] for an unusable margin or an empty id. The
    /// whole batch is checked before anything is placed.
    pub fn initialize_for_map(
        &mut self,
        map: impl Into<MapId>,
        entities: &[EntitySeed],
        bounds: Bounds,
        margin: Option<f64>,
    ) -> Result<Vec<EntityId>, PositionError> {
        let map = map.into();
        let margin = margin.unwrap_or(self.config.default_margin);
        // Re-validate corners; the fields are public.
        let bounds = Bounds::new(bounds.min, bounds.max)?;
        let area = bounds.inset(margin)?;
        if entities.iter().any(|seed| seed.id.as_str().is_empty()) {
            return Err(PositionError::EmptyId);
        }

        let mut placed = Vec::new();
        for seed in entities {
            if self.store.contains(seed.id.as_str()) {
                continue;
            }
            let position = placement::random_point(&area, &mut self.rng);
            self.store
                .place_on_map(seed.id.clone(), seed.name.clone(), position, map.clone())?;
            placed.push(seed.id.clone());
        }

        info!(
            map = %map,
            requested = entities.len(),
            placed = placed.len(),
            "map initialised"
        );
        if !placed.is_empty() {
            self.save();
        }
        Ok(placed)
    }

    /// Advance movement by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> TickReport {
        let report = self.scheduler.tick(&mut self.store, dt);
        if report.persist_requested {
            debug!(tick_id = report.tick_id, "movement settled; saving");
            self.save();
        }
        report
    }

    /// Whether the scheduler wants more ticks.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.scheduler.is_active()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use npc_persist::{MemoryStorage, SnapshotStorage};
    use npc_position::MoveCompletion;

    use super::*;

    fn config() -> MovementConfig {
        MovementConfig::default().with_speed(50.0)
    }

    fn seeds(ids: &[&str]) -> Vec<EntitySeed> {
        ids.iter().map(|id| EntitySeed::new(*id, id.to_uppercase())).collect()
    }

    fn persisted(sim: &Simulation) -> Vec<u8> {
        let adapter = sim.persistence().unwrap();
        adapter.storage().read(adapter.key()).unwrap().unwrap()
    }

    fn persistent_sim(storage: MemoryStorage) -> Simulation {
        let adapter = PersistenceAdapter::new(storage, "town").unwrap();
        Simulation::new(config()).unwrap().with_persistence(adapter)
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(Simulation::new(MovementConfig::default().with_speed(-1.0)).is_err());
        for frame_rate in [1e-30, 1e12] {
            let config = MovementConfig::default().with_frame_rate(frame_rate);
            assert!(matches!(
                Simulation::new(config),
                Err(PositionError::InvalidFrameRate(_))
            ));
        }
    }

    #[test]
    fn test_move_activates_and_arrives() {
        let mut sim = Simulation::new(config()).unwrap();
        sim.set_position("npc", "Wren", DVec2::ZERO, MovementStatus::Idle).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let outcome = sim
            .move_to(
                "npc",
                DVec2::new(100.0, 0.0),
                Some(Box::new(move |_: &MoveCompletion| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        assert!(outcome.is_applied());
        assert!(sim.is_active());
        assert_eq!(sim.scheduler().speed(), 50.0);
        assert_eq!(sim.scheduler().tick_id(), 0);

        sim.tick(1.0);
        let midway = sim.get_position("npc").unwrap();
        assert!((midway.position - DVec2::new(50.0, 0.0)).length() < 1e-9);
        assert_eq!(midway.status, MovementStatus::Moving);

        sim.tick(1.0);
        let done = sim.get_position("npc").unwrap();
        assert_eq!(done.position, DVec2::new(100.0, 0.0));
        assert_eq!(done.status, MovementStatus::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!sim.is_active());
        assert_eq!(sim.scheduler().tick_id(), 2);
    }

    #[test]
    fn test_move_unknown_does_not_activate() {
        let mut sim = Simulation::new(config()).unwrap();
        let outcome = sim.move_to("ghost", DVec2::ONE, None).unwrap();
        assert_eq!(outcome, CommandOutcome::NotFound);
        assert!(!sim.is_active());
        assert!(sim.store().is_empty());
    }

    #[test]
    fn test_initialize_for_map_is_idempotent() {
        let mut sim = Simulation::new(config()).unwrap().with_seed(3);
        let bounds = Bounds::from_size(800.0, 600.0).unwrap();

        let placed = sim
            .initialize_for_map("market", &seeds(&["a", "b"]), bounds, Some(50.0))
            .unwrap();
        assert_eq!(placed.len(), 2);
        let first = sim.get_all();

        let placed = sim
            .initialize_for_map("market", &seeds(&["a", "b", "c"]), bounds, Some(50.0))
            .unwrap();
        assert_eq!(placed, vec![EntityId::new("c")]);
        let second = sim.get_all();
        assert_eq!(&second[..2], &first[..]);

        let inner = bounds.inset(50.0).unwrap();
        for entity in &second {
            assert!(inner.contains(entity.position));
            assert!(entity.is_on(&MapId::new("market")));
            assert_eq!(entity.status, MovementStatus::Idle);
        }
    }

    #[test]
    fn test_initialize_for_map_uses_default_margin() {
        let mut sim = Simulation::new(config().with_default_margin(45.0)).unwrap();
        let bounds = Bounds::from_size(100.0, 100.0).unwrap();
        assert!(sim.initialize_for_map("tiny", &seeds(&["a"]), bounds, None).is_ok());
        let p = sim.get_position("a").unwrap().position;
        assert!(Bounds::new(DVec2::splat(45.0), DVec2::splat(55.0)).unwrap().contains(p));
    }

    #[test]
    fn test_initialize_for_map_rejects_before_mutating() {
        let mut sim = Simulation::new(config()).unwrap();
        let bounds = Bounds::from_size(100.0, 100.0).unwrap();
        assert!(sim.initialize_for_map("m", &seeds(&["a"]), bounds, Some(60.0)).is_err());
        assert!(sim.initialize_for_map("m", &seeds(&["a", ""]), bounds, None).is_err());
        let inverted = Bounds {
            min: DVec2::splat(10.0),
            max: DVec2::ZERO,
        };
        assert!(sim.initialize_for_map("m", &seeds(&["a"]), inverted, Some(0.0)).is_err());
        assert!(sim.store().is_empty());
    }

    #[test]
    fn test_commands_persist() {
        let mut sim = persistent_sim(MemoryStorage::new());
        sim.set_position("a", "Ada", DVec2::new(1.0, 2.0), MovementStatus::Idle).unwrap();
        assert!(String::from_utf8(persisted(&sim)).unwrap().contains("\"Ada\""));

        let _ = sim.remove("a");
        assert_eq!(persisted(&sim), b"[]");
    }

    #[test]
    fn test_settling_persists_final_position() {
        let mut sim = persistent_sim(MemoryStorage::new());
        sim.set_position("a", "Ada", DVec2::ZERO, MovementStatus::Idle).unwrap();
        let _ = sim.move_to("a", DVec2::new(10.0, 0.0), None).unwrap();
        sim.tick(1.0);
        assert!(String::from_utf8(persisted(&sim)).unwrap().contains("10.0"));
    }

    #[test]
    fn test_restore_reloads_moving_entity_as_idle() {
        let mut sim = persistent_sim(MemoryStorage::new());
        sim.set_position("a", "Ada", DVec2::ZERO, MovementStatus::Idle).unwrap();
        sim.set_position("b", "Bram", DVec2::new(7.0, 7.0), MovementStatus::Idle).unwrap();
        let _ = sim.move_to("a", DVec2::new(100.0, 0.0), None).unwrap();
        sim.tick(0.5);
        let midway = sim.get_position("a").unwrap().position;
        assert!(sim.save());

        let mut storage = MemoryStorage::new();
        storage.write("town", &persisted(&sim)).unwrap();
        let mut reloaded = persistent_sim(storage);
        let report = reloaded.restore();
        assert_eq!(report.restored, 2);

        let a = reloaded.get_position("a").unwrap();
        assert_eq!(a.status, MovementStatus::Idle);
        assert_eq!(a.position, midway);
        assert_eq!(reloaded.get_position("b").unwrap().display_name, "Bram");
        assert!(!reloaded.is_active());
    }

    #[test]
    fn test_stop_all_and_clear_deactivate() {
        let mut sim = Simulation::new(config()).unwrap();
        sim.set_position("a", "Ada", DVec2::ZERO, MovementStatus::Idle).unwrap();
        let _ = sim.move_to("a", DVec2::new(100.0, 0.0), None).unwrap();
        assert_eq!(sim.stop_all(), 1);
        assert!(!sim.is_active());

        let _ = sim.move_to("a", DVec2::new(100.0, 0.0), None).unwrap();
        assert_eq!(sim.clear(), 1);
        assert!(!sim.is_active());
        assert!(sim.get_all().is_empty());
    }

    #[test]
    fn test_no_drift_once_settled() {
        let mut sim = Simulation::new(config()).unwrap();
        sim.set_position("a", "Ada", DVec2::ZERO, MovementStatus::Idle).unwrap();
        let _ = sim.move_to("a", DVec2::new(3.0, 4.0), None).unwrap();
        sim.tick(1.0);
        let settled = sim.get_all();
        for _ in 0..50 {
            sim.tick(0.016);
        }
        assert_eq!(sim.get_all(), settled);
    }
}
