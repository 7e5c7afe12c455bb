//! Symmetric encryption primitives
//!
//! AES-256-GCM is the only cipher this workspace needs: it is what every
//! browser's WebCrypto implementation provides natively, so the WASM peer
//! engine and the native one share one code path end to end.

pub mod aes_gcm;
pub mod chunk;

pub use aes_gcm::{decrypt as aes_decrypt, encrypt as aes_encrypt};
pub use chunk::{decrypt_chunk, encrypt_chunk};

/// Key size in bytes for the chunk cipher.
pub const KEY_LEN: usize = 32;
