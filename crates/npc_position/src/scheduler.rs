//! Movement scheduler.
//!
//! The scheduler turns elapsed wall-clock time into path progress for every
//! moving entity. Each [`MovementScheduler::tick`]:
//!
//! 1. Returns immediately (and deactivates) if nothing is moving.
//! 2. Advances every moving record by `speed * dt / distance`, clamped to 1.
//! 3. Snaps arrivals onto their target, sets them idle and fires their
//!    completion callbacks exactly once.
//! 4. Stays active while anything is still moving; otherwise deactivates
//!    and asks for a persistence write.
//!
//! The scheduler holds no entity state of its own. It writes through the
//! store's update path and is driven by whoever owns the frame clock.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use crate::config::MovementConfig;
use crate::error::PositionError;
use crate::record::{EntityId, MoveCompletion, Step};
use crate::store::PositionStore;

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// The tick counter after this tick.
    pub tick_id: u64,
    /// Entities that moved but have not arrived yet.
    pub advanced: usize,
    /// Entities that arrived this tick, in store order.
    pub completed: Vec<EntityId>,
    /// Entities frozen because their interpolation went non-finite, or whose
    /// completion callback panicked.
    pub faulted: Vec<EntityId>,
    /// Whether another tick is needed.
    pub still_active: bool,
    /// Set when this tick brought the last mover to rest.
    pub persist_requested: bool,
}

/// Advances moving entities once per tick while anything is moving.
#[derive(Debug)]
pub struct MovementScheduler {
    /// Walking speed in map units per second.
    speed: f64,
    /// Whether the host should keep delivering ticks.
    active: bool,
    /// Monotonically increasing tick counter.
    tick_id: u64,
}

impl MovementScheduler {
    /// Create an inactive scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::InvalidSpeed`] if `speed` is not finite and
    /// strictly positive.
    pub fn new(speed: f64) -> Result<Self, PositionError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(PositionError::InvalidSpeed(speed));
        }
        Ok(Self {
            speed,
            active: false,
            tick_id: 0,
        })
    }

    /// Create a scheduler using the configured speed.
    ///
    /// # Errors
    ///
    /// See [`MovementScheduler::new`].
    pub fn from_config(config: &MovementConfig) -> Result<Self, PositionError> {
        Self::new(config.speed)
    }

    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Request ticks. Returns `true` only if the scheduler was idle, so the
    /// host can reset its frame clock exactly once per activation.
    pub fn activate(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        info!(tick_id = self.tick_id, "movement scheduler activated");
        true
    }

    /// Stop requesting ticks.
    pub fn deactivate(&mut self) {
        if self.active {
            self.active = false;
            info!(tick_id = self.tick_id, "movement scheduler idle");
        }
    }

    /// Advance every moving entity by `dt` seconds.
    ///
    /// A negative or non-finite `dt` counts as zero.
    pub fn tick(&mut self, store: &mut PositionStore, dt: f64) -> TickReport {
        self.tick_id += 1;

        if !store.has_moving() {
            self.deactivate();
            return TickReport {
                tick_id: self.tick_id,
                ..TickReport::default()
            };
        }

        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            warn!(tick_id = self.tick_id, dt, "discarding invalid tick delta");
            0.0
        };

        let mut report = TickReport {
            tick_id: self.tick_id,
            ..TickReport::default()
        };
        let mut arrivals = Vec::new();

        for (id, position, step) in store.step_moving(self.speed, dt) {
            match step {
                Step::Advanced => report.advanced += 1,
                Step::Arrived(callback) => {
                    report.completed.push(id.clone());
                    arrivals.push((MoveCompletion { id, position }, callback));
                }
                Step::Faulted => {
                    error!(tick_id = self.tick_id, %id, "interpolation went non-finite; entity frozen");
                    report.faulted.push(id);
                }
            }
        }

        // Callbacks run after every record has been updated, so a callback
        // never observes a half-advanced tick.
        for (completion, callback) in arrivals {
            debug!(tick_id = self.tick_id, id = %completion.id, "move completed");
            let Some(callback) = callback else { continue };
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&completion))).is_err() {
                error!(tick_id = self.tick_id, id = %completion.id, "completion callback panicked");
                report.faulted.push(completion.id);
            }
        }

        report.still_active = store.has_moving();
        if report.still_active {
            self.active = true;
        } else {
            self.deactivate();
            report.persist_requested = true;
        }

        debug!(
            tick_id = self.tick_id,
            dt,
            advanced = report.advanced,
            completed = report.completed.len(),
            "tick"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use npc_math::DVec2;

    use super::*;
    use crate::record::{CompletionCallback, MovementStatus};

    fn scheduler(speed: f64) -> MovementScheduler {
        MovementScheduler::new(speed).unwrap()
    }

    fn store_with_npc_at(x: f64, y: f64) -> PositionStore {
        let mut store = PositionStore::new();
        store
            .set_position("npc", "Wren", DVec2::new(x, y), MovementStatus::Idle)
            .unwrap();
        store
    }

    fn counting_callback(calls: &Arc<AtomicUsize>) -> CompletionCallback {
        let calls = Arc::clone(calls);
        Box::new(move |_: &MoveCompletion| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn assert_invariants(store: &PositionStore) {
        for record in store.iter() {
            match record.status() {
                MovementStatus::Moving => {
                    assert!(record.path().is_some_and(|p| p.len() >= 2));
                    assert!((0.0..1.0).contains(&record.path_progress()));
                }
                MovementStatus::Idle => {
                    assert!(record.path().is_none());
                    assert_eq!(record.path_progress(), 0.0);
                }
            }
        }
    }

    #[test]
    fn test_rejects_invalid_speed() {
        assert!(MovementScheduler::new(0.0).is_err());
        assert!(MovementScheduler::new(f64::NAN).is_err());
    }

    #[test]
    fn test_activation_is_idempotent() {
        let mut scheduler = scheduler(50.0);
        assert!(scheduler.activate());
        assert!(!scheduler.activate());
        assert!(scheduler.is_active());
    }

    #[test]
    fn test_tick_without_movers_deactivates() {
        let mut store = store_with_npc_at(0.0, 0.0);
        let mut scheduler = scheduler(50.0);
        scheduler.activate();
        let report = scheduler.tick(&mut store, 0.016);
        assert!(!scheduler.is_active());
        assert!(!report.still_active);
        assert!(!report.persist_requested);
    }

    #[test]
    fn test_walks_halfway_then_arrives_exactly() {
        let mut store = store_with_npc_at(0.0, 0.0);
        let mut scheduler = scheduler(50.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let _ = store.move_to("npc", DVec2::new(100.0, 0.0), Some(counting_callback(&calls)));
        scheduler.activate();

        let report = scheduler.tick(&mut store, 1.0);
        let snapshot = store.get_position("npc").unwrap();
        assert!((snapshot.position - DVec2::new(50.0, 0.0)).length() < 1e-9);
        assert_eq!(snapshot.status, MovementStatus::Moving);
        assert!(report.still_active);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_invariants(&store);

        let report = scheduler.tick(&mut store, 1.0);
        let snapshot = store.get_position("npc").unwrap();
        assert_eq!(snapshot.position, DVec2::new(100.0, 0.0));
        assert_eq!(snapshot.status, MovementStatus::Idle);
        assert!(snapshot.target_position.is_none());
        assert_eq!(report.completed, vec![EntityId::new("npc")]);
        assert!(report.persist_requested);
        assert!(!scheduler.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_invariants(&store);
    }

    #[test]
    fn test_zero_distance_completes_in_one_tick() {
        let mut store = store_with_npc_at(12.0, -3.0);
        let mut scheduler = scheduler(50.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let _ = store.move_to("npc", DVec2::new(12.0, -3.0), Some(counting_callback(&calls)));
        scheduler.activate();

        let report = scheduler.tick(&mut store, 0.016);
        assert_eq!(report.completed.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_position("npc").unwrap().status, MovementStatus::Idle);
    }

    #[test]
    fn test_large_dt_never_overshoots() {
        let mut store = store_with_npc_at(0.0, 0.0);
        let mut scheduler = scheduler(50.0);
        let _ = store.move_to("npc", DVec2::new(-30.0, 40.0), None);
        scheduler.tick(&mut store, 3_600.0);
        assert_eq!(store.get_position("npc").unwrap().position, DVec2::new(-30.0, 40.0));
    }

    #[test]
    fn test_invalid_dt_is_treated_as_zero() {
        let mut store = store_with_npc_at(0.0, 0.0);
        let mut scheduler = scheduler(50.0);
        let _ = store.move_to("npc", DVec2::new(100.0, 0.0), None);
        scheduler.tick(&mut store, -5.0);
        scheduler.tick(&mut store, f64::NAN);
        let snapshot = store.get_position("npc").unwrap();
        assert_eq!(snapshot.position, DVec2::ZERO);
        assert_eq!(snapshot.status, MovementStatus::Moving);
    }

    #[test]
    fn test_no_drift_after_everything_is_idle() {
        let mut store = store_with_npc_at(0.0, 0.0);
        let mut scheduler = scheduler(50.0);
        let _ = store.move_to("npc", DVec2::new(10.0, 10.0), None);
        scheduler.activate();
        while scheduler.tick(&mut store, 0.1).still_active {}

        let settled = store.get_all();
        for _ in 0..100 {
            let report = scheduler.tick(&mut store, 0.1);
            assert!(!report.still_active);
        }
        assert_eq!(store.get_all(), settled);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_others() {
        let mut store = PositionStore::new();
        for id in ["a", "b"] {
            store.set_position(id, id, DVec2::ZERO, MovementStatus::Idle).unwrap();
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let _ = store.move_to("a", DVec2::ZERO, Some(Box::new(|_: &MoveCompletion| panic!("boom"))));
        let _ = store.move_to("b", DVec2::ZERO, Some(counting_callback(&calls)));

        let mut scheduler = scheduler(50.0);
        let report = scheduler.tick(&mut store, 0.016);
        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.faulted, vec![EntityId::new("a")]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!store.has_moving());
    }

    #[test]
    fn test_non_finite_interpolation_freezes_only_that_entity() {
        let mut store = PositionStore::new();
        store
            .set_position("huge", "Huge", DVec2::new(-1e308, 0.0), MovementStatus::Idle)
            .unwrap();
        store.set_position("ok", "Ok", DVec2::ZERO, MovementStatus::Idle).unwrap();
        let _ = store.move_to("huge", DVec2::new(1e308, 0.0), None);
        let _ = store.move_to("ok", DVec2::new(100.0, 0.0), None);
        assert_eq!(store.moving_count(), 2);

        let mut scheduler = scheduler(50.0);
        let report = scheduler.tick(&mut store, 1.0);
        assert_eq!(report.faulted, vec![EntityId::new("huge")]);
        assert_eq!(report.advanced, 1);
        assert!(report.still_active);

        let huge = store.get_position("huge").unwrap();
        assert_eq!(huge.status, MovementStatus::Idle);
        assert_eq!(huge.position, DVec2::new(-1e308, 0.0));
        let ok = store.get_position("ok").unwrap();
        assert_eq!(ok.status, MovementStatus::Moving);
        assert!((ok.position - DVec2::new(50.0, 0.0)).length() < 1e-9);
        assert_eq!(store.moving_count(), 1);
        assert_invariants(&store);
    }

    #[test]
    fn test_tick_counter_advances_every_tick() {
        let mut store = store_with_npc_at(0.0, 0.0);
        let mut scheduler = scheduler(12.5);
        assert_eq!(scheduler.speed(), 12.5);
        assert_eq!(scheduler.tick_id(), 0);

        let first = scheduler.tick(&mut store, 0.1);
        let second = scheduler.tick(&mut store, 0.1);
        assert_eq!((first.tick_id, second.tick_id), (1, 2));
        assert_eq!(scheduler.tick_id(), 2);
    }

    #[test]
    fn test_callback_receives_arrival() {
        let mut store = store_with_npc_at(0.0, 0.0);
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let _ = store.move_to(
            "npc",
            DVec2::new(5.0, 0.0),
            Some(Box::new(move |done: &MoveCompletion| {
                *sink.lock().unwrap() = Some(done.clone());
            })),
        );
        let mut scheduler = scheduler(50.0);
        scheduler.tick(&mut store, 1.0);

        let done = seen.lock().unwrap().clone().unwrap();
        assert_eq!(done.id, EntityId::new("npc"));
        assert_eq!(done.position, DVec2::new(5.0, 0.0));
    }

    #[test]
    fn test_entities_move_independently() {
        let mut store = PositionStore::new();
        store.set_position("near", "Near", DVec2::ZERO, MovementStatus::Idle).unwrap();
        store.set_position("far", "Far", DVec2::ZERO, MovementStatus::Idle).unwrap();
        let _ = store.move_to("near", DVec2::new(25.0, 0.0), None);
        let _ = store.move_to("far", DVec2::new(200.0, 0.0), None);

        let mut scheduler = scheduler(50.0);
        let report = scheduler.tick(&mut store, 1.0);
        assert_eq!(report.completed, vec![EntityId::new("near")]);
        assert_eq!(report.advanced, 1);
        assert!(report.still_active);
        assert!(!report.persist_requested);
        assert!((store.get_position("far").unwrap().position.x - 50.0).abs() < 1e-9);
    }
}
