//! Wasm-bindgen wrappers around wharf-crypto's chunk AEAD.
//!
//! The browser uses the identical AES-256-GCM chunk format as the native
//! peer engine -- same `encrypt_chunk`/`decrypt_chunk` calls, so an
//! encrypted transfer looks the same from either side of the data channel.

use wasm_bindgen::prelude::*;

/// Generate a fresh 32-byte session key for an encrypted transfer.
///
/// Uses the browser's CSPRNG via `getrandom`'s `js` backend.
#[wasm_bindgen(js_name = "generateSessionKey")]
pub fn generate_session_key() -> Result<Vec<u8>, JsValue> {
    use rand::rngs::OsRng;
    use rand::RngCore;

    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    Ok(key.to_vec())
}

/// Encrypt one data-channel chunk, returning `iv || ciphertext || tag`.
#[wasm_bindgen(js_name = "encryptChunk")]
pub fn encrypt_chunk(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, JsValue> {
    let key = key_array(key)?;
    wharf_crypto::encrypt_chunk(&key, plaintext).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Decrypt one data-channel chunk previously produced by `encryptChunk`.
#[wasm_bindgen(js_name = "decryptChunk")]
pub fn decrypt_chunk(key: &[u8], framed: &[u8]) -> Result<Vec<u8>, JsValue> {
    let key = key_array(key)?;
    wharf_crypto::decrypt_chunk(&key, framed).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn key_array(key: &[u8]) -> Result<[u8; 32], JsValue> {
    key.try_into()
        .map_err(|_| JsValue::from_str(&format!("key must be exactly 32 bytes, got {}", key.len())))
}
