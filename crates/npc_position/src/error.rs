//! Position-layer error and outcome types.

use npc_math::GeometryError;

use crate::record::EntityId;

/// Input rejected before any mutation took place.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    /// A coordinate, bounds rectangle or margin was malformed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Entity ids must contain at least one character.
    #[error("entity id must not be empty")]
    EmptyId,

    /// `Moving` was requested without a path to follow.
    #[error("entity {0} cannot be set to moving directly; issue a move instead")]
    MovingWithoutPath(EntityId),

    /// Movement speed must be finite and strictly positive.
    #[error("invalid speed {0}: must be finite and positive")]
    InvalidSpeed(f64),

    /// Frame rate must be finite and strictly positive.
    #[error("invalid frame rate {0}: must be finite and positive")]
    InvalidFrameRate(f64),

    /// The sampling interval must be at least one millisecond.
    #[error("invalid poll interval {0} ms: must be at least 1 ms")]
    InvalidPollInterval(u64),
}

/// The result of a command addressed to a single entity.
///
/// An unknown id is not an error: the command is logged and dropped, and the
/// caller learns about it through [`CommandOutcome::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum CommandOutcome {
    /// The entity existed and the command took effect.
    Applied,
    /// No entity with that id is tracked; nothing changed.
    NotFound,
}

impl CommandOutcome {
    /// Returns `true` if the command took effect.
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}
