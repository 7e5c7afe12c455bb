//! Wire formats: signalling frames (WebSocket) and data-channel frames
//! (the peer-to-peer transport).

pub mod datachannel;
pub mod signal;

pub use datachannel::{ControlFrame, CHUNK_SIZE, HIGH_WATERMARK, IV_LEN, LOW_WATERMARK, TAG_LEN};
pub use signal::{ClientFrame, OpaqueCandidate, OpaqueSdp, ServerFrame};
