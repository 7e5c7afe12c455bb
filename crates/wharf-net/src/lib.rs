//! Peer engines for the wharf transfer protocol
//!
//! Drives an abstract [`connection::PeerConnection`]/[`connection::DataChannel`]
//! pair through the offerer and answerer state machines: offer/answer/ICE
//! exchange, `sid` fencing against stale frames, chunked data-channel
//! transfer, and optional per-chunk decryption. Has no opinion on how the
//! underlying connection is actually realised -- that is a concrete binding
//! (browser WebRTC in `wharf-web`, or a native library for a terminal
//! sender) living on the other side of the trait boundary.

#![forbid(unsafe_code)]

pub mod answerer;
pub mod connection;
pub mod error;
pub mod offerer;

pub use answerer::{AnswererEngine, AnswererEvent};
pub use connection::{DataChannel, Frame, PeerConnection};
pub use error::NetError;
pub use offerer::OffererEngine;

/// Result type for peer-engine operations
pub type Result<T> = std::result::Result<T, NetError>;
