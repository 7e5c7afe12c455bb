//! Wharf signalling protocol
//!
//! Defines the room scheduler (state machine for the waiting/active/done
//! queue and the signalling relay's authorization rules), the wire formats
//! for both the signalling WebSocket and the peer-to-peer data channel,
//! and the room-id contract. This crate has no network or async-runtime
//! dependency of its own: the relay and peer-engine crates drive it.

#![forbid(unsafe_code)]

pub mod room;
pub mod wire;
