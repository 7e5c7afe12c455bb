//! Default `ConfigStore`: an in-memory `DashMap`. Rooms are ephemeral and
//! this relay has no cross-process persistence requirement, but the trait
//! boundary lets an operator swap in a durable implementation without
//! touching the room actor.

use dashmap::DashMap;

use wharf_protocol::room::{ConfigStore, RoomConfig};

/// In-memory room configuration store, keyed by room id.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: DashMap<String, RoomConfig>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for InMemoryConfigStore {
    async fn load(&self, room_id: &str) -> Option<RoomConfig> {
        self.configs.get(room_id).map(|entry| entry.clone())
    }

    async fn save(&self, room_id: &str, config: RoomConfig) {
        self.configs.insert(room_id.to_string(), config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryConfigStore::new();
        let config = RoomConfig::new(Some(5), Some("creator".into()));
        store.save("room1", config.clone()).await;
        let loaded = store.load("room1").await.unwrap();
        assert_eq!(loaded.max_concurrent, 5);
        assert_eq!(loaded.creator_cid.as_deref(), Some("creator"));
    }

    #[tokio::test]
    async fn unknown_room_loads_as_none() {
        let store = InMemoryConfigStore::new();
        assert!(store.load("never-created").await.is_none());
    }
}
