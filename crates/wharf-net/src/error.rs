//! Peer-engine error types

use thiserror::Error;

/// Result type alias using NetError
pub type Result<T> = std::result::Result<T, NetError>;

/// Errors surfaced by the peer connection binding or the engines driving it.
///
/// Most protocol-level oddities (stale `sid`, unauthorized relay, unknown
/// frame) are handled by silently dropping the frame rather than raising an
/// error here -- see the engines' own frame-handling code. This type covers
/// the failures a `PeerConnection` binding can actually produce.
#[derive(Error, Debug)]
pub enum NetError {
    /// The concrete `PeerConnection` binding rejected a remote description.
    #[error("failed to set remote description: {0}")]
    RemoteDescription(String),

    /// The concrete `PeerConnection` binding rejected an ICE candidate.
    #[error("failed to add ice candidate: {0}")]
    IceCandidate(String),

    /// A cryptographic operation on a data-channel chunk failed.
    #[error(transparent)]
    Crypto(#[from] wharf_crypto::CryptoError),

    /// The data channel closed while an operation was in flight.
    #[error("data channel closed")]
    ChannelClosed,
}
