//! The demo roster and its errands.

use npc_math::{Bounds, DVec2};
use npc_runtime::EntitySeed;
use npc_runtime::placement::random_point;

const NAMES: &[&str] = &[
    "Mira", "Tobin", "Alis", "Corwen", "Jessa", "Bram", "Odile", "Fenn",
];

/// `count` villagers with stable ids `npc-1`, `npc-2`, ...
///
/// Names cycle once the list runs out, with a numeric suffix.
#[must_use]
pub fn roster(count: usize) -> Vec<EntitySeed> {
    (0..count)
        .map(|i| {
            let base = NAMES[i % NAMES.len()];
            let name = match i / NAMES.len() {
                0 => base.to_string(),
                round => format!("{base} {}", round + 1),
            };
            EntitySeed::new(format!("npc-{}", i + 1), name)
        })
        .collect()
}

/// One random destination per seed, inside `area`.
#[must_use]
pub fn errands(
    seeds: &[EntitySeed],
    area: &Bounds,
    rng: &mut fastrand::Rng,
) -> Vec<(EntitySeed, DVec2)> {
    seeds
        .iter()
        .map(|seed| (seed.clone(), random_point(area, rng)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_ids_are_unique_and_stable() {
        let seeds = roster(10);
        assert_eq!(seeds.len(), 10);
        assert_eq!(seeds[0].id.as_str(), "npc-1");
        assert_eq!(seeds[0].name, "Mira");
        assert_eq!(seeds[8].name, "Mira 2");

        let mut ids: Vec<_> = seeds.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
        assert_eq!(roster(10), seeds);
    }

    #[test]
    fn test_errands_stay_inside_area() {
        let area = Bounds::from_size(300.0, 200.0).unwrap();
        let mut rng = fastrand::Rng::with_seed(5);
        let trips = errands(&roster(20), &area, &mut rng);
        assert_eq!(trips.len(), 20);
        assert!(trips.iter().all(|(_, target)| area.contains(*target)));
    }
}
