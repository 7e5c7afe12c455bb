//! Wharf WebAssembly browser client
//!
//! Thin wasm-bindgen wrapper over `wharf-crypto` and `wharf-protocol` wire
//! types, plus a browser `RtcPeerConnection` binding for the
//! `wharf-net` offerer/answerer engines. The browser drives the same
//! state machines and the same chunk AEAD as a native terminal sender.
#![forbid(unsafe_code)]

pub mod codec;
pub mod crypto;

#[cfg(target_arch = "wasm32")]
pub mod transport;

use wasm_bindgen::prelude::*;

/// Initialize the WASM module (called automatically on load).
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}
