//! Random placement of NPCs on a map.

use npc_math::{Bounds, DVec2};
use npc_position::EntityId;

/// An entity to register on a map if it is not tracked yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySeed {
    pub id: EntityId,
    pub name: String,
}

impl EntitySeed {
    #[must_use]
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A uniformly distributed point inside `area`.
#[must_use]
pub fn random_point(area: &Bounds, rng: &mut fastrand::Rng) -> DVec2 {
    area.point_at(rng.f64(), rng.f64())
}
