//! Data-channel chunk framing: `IV(12B) || AES-256-GCM(plaintext) || tag(16B)`
//!
//! No additional authenticated data is used -- the chunk boundary itself
//! carries no metadata that needs binding, and the meta/done control frames
//! are sent as plaintext JSON alongside the encrypted binary frames. The IV
//! is freshly random per chunk; with a session-scoped key this keeps nonce
//! reuse probability negligible for any transfer within this protocol's
//! size range.

use rand::rngs::OsRng;
use rand::RngCore;

use super::aes_gcm;
use crate::error::{CryptoError, Result};

/// Length of the IV prefixed to every encrypted chunk.
pub const IV_LEN: usize = 12;

/// Encrypt one chunk for the data channel, returning `iv || ciphertext || tag`.
pub fn encrypt_chunk(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = aes_gcm::encrypt(key, &iv, plaintext, &[])?;

    let mut framed = Vec::with_capacity(IV_LEN + ciphertext.len());
    framed.extend_from_slice(&iv);
    framed.extend_from_slice(&ciphertext);
    Ok(framed)
}

/// Decrypt one data-channel frame previously produced by [`encrypt_chunk`].
pub fn decrypt_chunk(key: &[u8; 32], framed: &[u8]) -> Result<Vec<u8>> {
    if framed.len() < IV_LEN {
        return Err(CryptoError::FrameTooSmall {
            needed: IV_LEN,
            actual: framed.len(),
        });
    }

    let (iv, ciphertext) = framed.split_at(IV_LEN);
    let iv: [u8; IV_LEN] = iv.try_into().expect("split_at guarantees exact length");

    aes_gcm::decrypt(key, &iv, ciphertext, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [7u8; 32];
        let plaintext = vec![9u8; 16 * 1024];

        let framed = encrypt_chunk(&key, &plaintext).unwrap();
        assert_eq!(framed.len(), IV_LEN + plaintext.len() + 16);

        let decrypted = decrypt_chunk(&key, &framed).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn distinct_ivs_per_call() {
        let key = [7u8; 32];
        let plaintext = b"same bytes every time";

        let a = encrypt_chunk(&key, plaintext).unwrap();
        let b = encrypt_chunk(&key, plaintext).unwrap();

        assert_ne!(&a[..IV_LEN], &b[..IV_LEN], "IV must be fresh per chunk");
        assert_ne!(a, b);
    }

    #[test]
    fn corrupted_iv_fails_decryption() {
        let key = [3u8; 32];
        let plaintext = b"chunk payload";

        let mut framed = encrypt_chunk(&key, plaintext).unwrap();
        framed[0] ^= 0xFF;

        assert!(decrypt_chunk(&key, &framed).is_err());
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let key = [3u8; 32];
        let short = [0u8; 4];

        let err = decrypt_chunk(&key, &short).unwrap_err();
        assert!(matches!(err, CryptoError::FrameTooSmall { .. }));
    }
}
