//! Room configuration: the one piece of state a room remembers for its
//! whole lifetime, seeded at creation and immutable afterwards.

use serde::{Deserialize, Serialize};

/// Lower bound for `maxConcurrent`.
pub const MIN_CONCURRENT: u32 = 1;
/// Upper bound for `maxConcurrent`.
pub const MAX_CONCURRENT: u32 = 10;
/// Default concurrency ceiling when the creator does not specify one.
pub const DEFAULT_CONCURRENT: u32 = 3;

/// Per-room configuration, seeded by `POST /api/rooms` and rehydrated from
/// a [`crate::room::ConfigStore`] on room revival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum number of receivers admitted to `active` at once.
    pub max_concurrent: u32,
    /// If set, only this `cid` may ever take the offerer role in this room.
    pub creator_cid: Option<String>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_CONCURRENT,
            creator_cid: None,
        }
    }
}

impl RoomConfig {
    /// Build a config from a client-supplied `maxConcurrent`, clamping it
    /// into `[MIN_CONCURRENT, MAX_CONCURRENT]` and defaulting when absent.
    pub fn new(max_concurrent: Option<u32>, creator_cid: Option<String>) -> Self {
        let max_concurrent = max_concurrent
            .unwrap_or(DEFAULT_CONCURRENT)
            .clamp(MIN_CONCURRENT, MAX_CONCURRENT);
        Self {
            max_concurrent,
            creator_cid,
        }
    }

    /// Whether this config pins the offerer role to one `cid`.
    pub fn has_creator_pin(&self) -> bool {
        self.creator_cid.is_some()
    }
}
