//! Entity records and their movement state.
//!
//! An [`EntityRecord`] is owned exclusively by the
//! [`PositionStore`](crate::PositionStore). Its movement state is a
//! [`Motion`]: either idle, or moving along a two-point path with a progress
//! value in `[0, 1)`. Because the path and progress only exist inside
//! [`Motion::Moving`], an idle record can never carry a stale path.
//!
//! Consumers never see a record directly; they get an [`EntitySnapshot`].

use std::borrow::Borrow;
use std::fmt;
use std::time::Instant;

use npc_math::DVec2;
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from anything string-like.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Stable, unique identifier of a tracked entity.
    EntityId
);

string_id!(
    /// Identifier of the map (location) an entity belongs to.
    MapId
);

/// Coarse movement state, as exposed to consumers and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    /// Standing still.
    #[default]
    Idle,
    /// Walking towards a target.
    Moving,
}

/// Information handed to a completion callback when a move arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveCompletion {
    /// The entity that arrived.
    pub id: EntityId,
    /// Where it arrived; always exactly the requested target.
    pub position: DVec2,
}

/// Invoked exactly once when a move reaches its target.
///
/// Dropped without being called if the move is superseded, stopped, or the
/// entity is removed.
pub type CompletionCallback = Box<dyn FnOnce(&MoveCompletion) + Send + 'static>;

/// An in-flight move along a straight two-point path.
pub struct ActiveMove {
    path: [DVec2; 2],
    progress: f64,
    on_complete: Option<CompletionCallback>,
}

impl ActiveMove {
    fn new(start: DVec2, target: DVec2, on_complete: Option<CompletionCallback>) -> Self {
        Self {
            path: [start, target],
            progress: 0.0,
            on_complete,
        }
    }

    /// The waypoints, start first.
    #[must_use]
    pub fn path(&self) -> &[DVec2] {
        &self.path
    }

    #[must_use]
    pub fn start(&self) -> DVec2 {
        self.path[0]
    }

    #[must_use]
    pub fn target(&self) -> DVec2 {
        self.path[self.path.len() - 1]
    }

    /// Fraction of the path already covered, in `[0, 1)`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Returns `true` if a completion callback is waiting.
    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.on_complete.is_some()
    }
}

impl fmt::Debug for ActiveMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveMove")
            .field("path", &self.path)
            .field("progress", &self.progress)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Movement state of a record.
#[derive(Debug, Default)]
pub enum Motion {
    #[default]
    Idle,
    Moving(ActiveMove),
}

/// Result of advancing one moving record by one tick.
pub(crate) enum Step {
    /// Still moving; progress and position updated.
    Advanced,
    /// Reached the target and is now idle.
    Arrived(Option<CompletionCallback>),
    /// Interpolation produced a non-finite value; frozen idle in place.
    Faulted,
}

/// One tracked entity.
#[derive(Debug)]
pub struct EntityRecord {
    id: EntityId,
    display_name: String,
    position: DVec2,
    motion: Motion,
    map: Option<MapId>,
    last_update: Instant,
}

impl EntityRecord {
    pub(crate) fn new(id: EntityId, display_name: String, position: DVec2, map: Option<MapId>) -> Self {
        Self {
            id,
            display_name,
            position,
            motion: Motion::Idle,
            map,
            last_update: Instant::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Current position; always the latest interpolation while moving.
    #[must_use]
    pub fn position(&self) -> DVec2 {
        self.position
    }

    #[must_use]
    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    #[must_use]
    pub fn map(&self) -> Option<&MapId> {
        self.map.as_ref()
    }

    /// When this record was last mutated.
    #[must_use]
    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    #[must_use]
    pub fn status(&self) -> MovementStatus {
        match self.motion {
            Motion::Idle => MovementStatus::Idle,
            Motion::Moving(_) => MovementStatus::Moving,
        }
    }

    #[must_use]
    pub fn is_moving(&self) -> bool {
        matches!(self.motion, Motion::Moving(_))
    }

    /// Waypoints of the current move, if any.
    #[must_use]
    pub fn path(&self) -> Option<&[DVec2]> {
        match &self.motion {
            Motion::Idle => None,
            Motion::Moving(active) => Some(active.path()),
        }
    }

    /// Progress along the current path; `0.0` when idle.
    #[must_use]
    pub fn path_progress(&self) -> f64 {
        match &self.motion {
            Motion::Idle => 0.0,
            Motion::Moving(active) => active.progress(),
        }
    }

    #[must_use]
    pub fn target_position(&self) -> Option<DVec2> {
        match &self.motion {
            Motion::Idle => None,
            Motion::Moving(active) => Some(active.target()),
        }
    }

    /// Take an owned copy suitable for handing to consumers.
    #[must_use]
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            position: self.position,
            status: self.status(),
            path: self.path().map(<[DVec2]>::to_vec),
            path_progress: self.path_progress(),
            target_position: self.target_position(),
            map: self.map.clone(),
            last_update: self.last_update,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_update = Instant::now();
    }

    /// Overwrite position and name, returning to idle. Any pending callback
    /// is dropped without being called.
    pub(crate) fn reset(&mut self, display_name: String, position: DVec2, map: Option<MapId>) {
        self.display_name = display_name;
        self.position = position;
        self.motion = Motion::Idle;
        if map.is_some() {
            self.map = map;
        }
        self.touch();
    }

    /// Start (or supersede) a move from the current position.
    pub(crate) fn begin_move(&mut self, target: DVec2, on_complete: Option<CompletionCallback>) {
        self.motion = Motion::Moving(ActiveMove::new(self.position, target, on_complete));
        self.touch();
    }

    /// Freeze at the current position. Returns `true` if the record was moving.
    pub(crate) fn halt(&mut self) -> bool {
        let was_moving = self.is_moving();
        self.motion = Motion::Idle;
        if was_moving {
            self.touch();
        }
        was_moving
    }

    /// Advance the current move by `dt` seconds at `speed` units per second.
    ///
    /// Progress is clamped to 1, so a large `dt` lands exactly on the target
    /// and never past it. Only called on moving records.
    pub(crate) fn step(&mut self, speed: f64, dt: f64) -> Step {
        debug_assert!(self.is_moving(), "stepped an idle record");
        let Motion::Moving(active) = &mut self.motion else {
            // Nothing to advance; the record stays where it is.
            return Step::Advanced;
        };

        let (start, target) = (active.start(), active.target());
        let total = start.distance(target);
        let progress = if total == 0.0 {
            1.0
        } else {
            (active.progress + speed * dt / total).min(1.0)
        };

        if progress >= 1.0 {
            let callback = active.on_complete.take();
            self.position = target;
            self.motion = Motion::Idle;
            self.touch();
            return Step::Arrived(callback);
        }

        let next = npc_math::lerp(start, target, progress);
        if !next.is_finite() || !progress.is_finite() {
            self.motion = Motion::Idle;
            self.touch();
            return Step::Faulted;
        }

        active.progress = progress;
        self.position = next;
        self.touch();
        Step::Advanced
    }
}

/// An owned copy of an [`EntityRecord`], without its callback.
///
/// Mutating a snapshot has no effect on the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub display_name: String,
    pub position: DVec2,
    pub status: MovementStatus,
    /// Present only while moving.
    pub path: Option<Vec<DVec2>>,
    /// In `[0, 1)` while moving, `0.0` when idle.
    pub path_progress: f64,
    pub target_position: Option<DVec2>,
    pub map: Option<MapId>,
    pub last_update: Instant,
}

impl EntitySnapshot {
    /// Returns `true` if the entity belongs to `map`.
    #[must_use]
    pub fn is_on(&self, map: &MapId) -> bool {
        self.map.as_ref() == Some(map)
    }
}
