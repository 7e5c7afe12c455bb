//! Frames carried on the peer-to-peer data channel, as opposed to the
//! signalling WebSocket. Two kinds travel over the same ordered channel:
//! textual control frames and binary payload frames.

use serde::{Deserialize, Serialize};

/// Size of one payload slice before any encryption overhead.
pub const CHUNK_SIZE: usize = 16 * 1024;
/// Send-side backpressure: pause sending once buffered data exceeds this.
pub const HIGH_WATERMARK: usize = 8 * 1024 * 1024;
/// Send-side backpressure: resume once buffered data drops to this.
pub const LOW_WATERMARK: usize = 4 * 1024 * 1024;
/// Length of the IV prefixed to an encrypted chunk.
pub const IV_LEN: usize = 12;
/// Length of the AES-GCM authentication tag appended to ciphertext.
pub const TAG_LEN: usize = 16;

/// Textual control frame, sent as `type`-tagged JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    /// Announces the artifact about to be streamed.
    Meta {
        name: String,
        size: u64,
        mime: String,
        encrypted: bool,
    },
    /// Marks the end of the chunk stream.
    Done,
}
