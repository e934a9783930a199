//! Snapshot publication.
//!
//! The bridge publishes a fresh [`WorldSnapshot`] after every command and on
//! every sampling interval. A [`SnapshotFeed`] is a consumer's view of that
//! stream, optionally narrowed to a single map.

use std::sync::Arc;

use npc_position::{EntitySnapshot, MapId};
use tokio::sync::watch;

use crate::error::BridgeError;

/// One published copy of the whole store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    /// Increases by one with every publication.
    pub sequence: u64,
    /// Every tracked entity, in store order.
    pub entities: Vec<EntitySnapshot>,
}

impl WorldSnapshot {
    /// The entity with this id, if present.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id.as_str() == id)
    }

    /// Entities on `map`, in store order.
    pub fn on_map<'a>(&'a self, map: &'a MapId) -> impl Iterator<Item = &'a EntitySnapshot> + 'a {
        self.entities.iter().filter(move |e| e.is_on(map))
    }
}

/// A subscription to published snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotFeed {
    rx: watch::Receiver<Arc<WorldSnapshot>>,
    map: Option<MapId>,
}

impl SnapshotFeed {
    pub(crate) fn new(rx: watch::Receiver<Arc<WorldSnapshot>>, map: Option<MapId>) -> Self {
        Self { rx, map }
    }

    /// The map this feed is narrowed to, if any.
    #[must_use]
    pub fn map(&self) -> Option<&MapId> {
        self.map.as_ref()
    }

    /// Sequence number of the latest publication.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.rx.borrow().sequence
    }

    /// The latest entities visible to this feed.
    #[must_use]
    pub fn current(&self) -> Vec<EntitySnapshot> {
        let snapshot = Arc::clone(&self.rx.borrow());
        self.filter(&snapshot)
    }

    /// Wait for the next publication and return its entities.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Closed`] once the bridge has shut down.
    pub async fn changed(&mut self) -> Result<Vec<EntitySnapshot>, BridgeError> {
        self.rx.changed().await.map_err(|_| BridgeError::Closed)?;
        let snapshot = Arc::clone(&self.rx.borrow_and_update());
        Ok(self.filter(&snapshot))
    }

    fn filter(&self, snapshot: &WorldSnapshot) -> Vec<EntitySnapshot> {
        match &self.map {
            Some(map) => snapshot.on_map(map).cloned().collect(),
            None => snapshot.entities.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use npc_math::DVec2;
    use npc_position::{EntityId, MovementStatus, PositionStore};

    use super::*;

    fn published() -> WorldSnapshot {
        let mut store = PositionStore::new();
        store.place_on_map("a", "Ada", DVec2::ZERO, MapId::new("docks")).unwrap();
        store.place_on_map("b", "Bram", DVec2::ONE, MapId::new("mine")).unwrap();
        store.set_position("c", "Cole", DVec2::ONE, MovementStatus::Idle).unwrap();
        WorldSnapshot {
            sequence: 1,
            entities: store.get_all(),
        }
    }

    #[test]
    fn test_world_snapshot_lookup() {
        let snapshot = published();
        assert_eq!(snapshot.get("b").unwrap().display_name, "Bram");
        assert!(snapshot.get("z").is_none());
        assert_eq!(snapshot.on_map(&MapId::new("docks")).count(), 1);
    }

    #[test]
    fn test_feed_filters_by_map() {
        let (_tx, rx) = watch::channel(Arc::new(published()));
        let docks = SnapshotFeed::new(rx.clone(), Some(MapId::new("docks")));
        let all = SnapshotFeed::new(rx, None);

        let ids: Vec<_> = docks.current().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![EntityId::new("a")]);
        assert_eq!(all.current().len(), 3);
        assert_eq!(all.sequence(), 1);
    }

    #[tokio::test]
    async fn test_feed_changed_sees_new_publication() {
        let (tx, rx) = watch::channel(Arc::new(WorldSnapshot::default()));
        let mut feed = SnapshotFeed::new(rx, None);
        tx.send_replace(Arc::new(published()));
        let entities = feed.changed().await.unwrap();
        assert_eq!(entities.len(), 3);

        drop(tx);
        assert!(matches!(feed.changed().await, Err(BridgeError::Closed)));
    }
}
