//! Durable storage boundary for room configuration.
//!
//! The distilled specification leaves "durable storage reads/writes for
//! config" as a suspension point for the host application. This trait
//! names that boundary so the room actor never has to know whether
//! configuration lives in memory, in a database, or somewhere else --
//! rooms are ephemeral and ordinarily need no cross-process persistence,
//! but an operator may swap in a durable implementation without touching
//! scheduling logic.

use super::config::RoomConfig;

/// Reads and writes of room configuration, keyed by room id.
#[allow(async_fn_in_trait)]
pub trait ConfigStore: Send + Sync {
    /// Fetch a previously saved configuration, if any.
    async fn load(&self, room_id: &str) -> Option<RoomConfig>;

    /// Persist a configuration. Called once, at room creation.
    async fn save(&self, room_id: &str, config: RoomConfig);
}
