//! Error types for cryptographic operations

use thiserror::Error;

/// Result type alias using CryptoError
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Error during encryption
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Error during decryption (includes authentication failure)
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Invalid key material (wrong length, all-zero, etc.)
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Frame too short to contain an IV
    #[error("frame too small: need at least {needed} bytes, got {actual}")]
    FrameTooSmall {
        /// Minimum required frame size
        needed: usize,
        /// Actual frame size
        actual: usize,
    },

    /// I/O error during a memory-safety operation (mlock, setrlimit, ...)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CryptoError {
    fn from(e: std::io::Error) -> Self {
        CryptoError::Io(e.to_string())
    }
}
