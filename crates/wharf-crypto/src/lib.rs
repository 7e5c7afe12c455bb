//! # Wharf Cryptography Library
//!
//! Symmetric encryption primitives for the wharf peer-to-peer transfer
//! protocol. The server never holds key material; this crate exists for
//! the sender and receiver peer engines (native and WASM) to encrypt and
//! decrypt data-channel chunks with a key that is generated client-side
//! and never crosses the wire.
//!
//! ## Features
//!
//! - AES-256-GCM chunk encryption matching the `IV || ciphertext+tag` wire
//!   format (no additional authenticated data).
//! - Memory safety: zeroization of key material, core-dump suppression.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod mem;
pub mod symmetric;

pub use error::{CryptoError, Result};
pub use symmetric::chunk::{decrypt_chunk, encrypt_chunk};

/// Library version constant
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the cryptography library (e.g., prevent core dumps).
///
/// Should be called once at process startup in the relay and any native
/// peer-engine binary. Not applicable in WASM builds.
pub fn init() -> Result<()> {
    mem::wipe::prevent_core_dumps()?;
    Ok(())
}
