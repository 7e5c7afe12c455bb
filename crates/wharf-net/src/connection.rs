//! The `PeerConnection`/`DataChannel` boundary between an engine's state
//! machine and whatever actually speaks ICE/SDP.
//!
//! A real binding (browser WebRTC via `wasm-bindgen`/`web-sys` in
//! `wharf-web`, or a native WebRTC library for a terminal sender) implements
//! these traits. [`mock`] provides an in-memory pair for deterministic
//! engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Notify};

use wharf_protocol::wire::{ControlFrame, OpaqueCandidate, OpaqueSdp};

use crate::error::{NetError, Result};

/// One frame travelling over the data channel: textual control or binary
/// payload. Mirrors the two frame kinds named in the data-channel wire
/// format.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A `meta` or `done` control frame.
    Control(ControlFrame),
    /// A chunk of payload, plaintext or already encrypted depending on the
    /// transfer's `encrypted` flag.
    Data(Vec<u8>),
}

impl Frame {
    fn byte_len(&self) -> usize {
        match self {
            Frame::Control(_) => 0,
            Frame::Data(bytes) => bytes.len(),
        }
    }
}

/// An ICE/SDP-capable connection, driven by an engine rather than owned
/// directly.
#[allow(async_fn_in_trait)]
pub trait PeerConnection: Send {
    /// Create an offer. Implementations that support ICE restart should
    /// honor it here; the engines always treat a fresh offer as a restart.
    async fn create_offer(&mut self) -> OpaqueSdp;
    /// Create an answer to a previously applied remote offer.
    async fn create_answer(&mut self) -> OpaqueSdp;
    /// Apply a just-created offer or answer as the local description.
    async fn set_local_description(&mut self, sdp: &OpaqueSdp);
    /// Apply a peer's offer or answer as the remote description.
    async fn set_remote_description(&mut self, sdp: &OpaqueSdp) -> Result<()>;
    /// Add a remote ICE candidate.
    async fn add_ice_candidate(&mut self, candidate: &OpaqueCandidate) -> Result<()>;
    /// Drain one locally gathered candidate, if any is pending.
    fn poll_local_candidate(&mut self) -> Option<OpaqueCandidate>;
    /// Borrow the data channel carried by this connection.
    fn data_channel(&mut self) -> &mut dyn DataChannel;
}

/// The ordered `file`-labelled data channel carried by a [`PeerConnection`].
#[allow(async_fn_in_trait)]
pub trait DataChannel: Send {
    /// Send one frame. Ordering is preserved by the underlying channel.
    async fn send(&mut self, frame: Frame) -> Result<()>;
    /// Receive the next frame, or `None` once the channel has closed.
    async fn recv(&mut self) -> Option<Frame>;
    /// Bytes currently queued for send but not yet delivered.
    fn buffered_amount(&self) -> usize;
    /// Resolve once `buffered_amount` has dropped back to the low
    /// watermark, for send-side backpressure.
    async fn wait_for_low_watermark(&mut self);
}

/// In-memory `PeerConnection`/`DataChannel` pair for deterministic tests.
pub mod mock {
    use super::*;
    use wharf_protocol::wire::LOW_WATERMARK;

    struct Direction {
        buffered: Arc<AtomicUsize>,
        notify: Arc<Notify>,
    }

    /// An in-memory data channel, one end of a connected pair.
    pub struct MockDataChannel {
        outbox: mpsc::UnboundedSender<Frame>,
        inbox: Mutex<mpsc::UnboundedReceiver<Frame>>,
        send_dir: Direction,
        recv_dir: Direction,
    }

    impl DataChannel for MockDataChannel {
        async fn send(&mut self, frame: Frame) -> Result<()> {
            self.send_dir
                .buffered
                .fetch_add(frame.byte_len(), Ordering::SeqCst);
            self.outbox.send(frame).map_err(|_| NetError::ChannelClosed)
        }

        async fn recv(&mut self) -> Option<Frame> {
            let frame = self.inbox.lock().await.recv().await?;
            let len = frame.byte_len();
            if len > 0 {
                self.recv_dir.buffered.fetch_sub(len, Ordering::SeqCst);
                self.recv_dir.notify.notify_waiters();
            }
            Some(frame)
        }

        fn buffered_amount(&self) -> usize {
            self.send_dir.buffered.load(Ordering::SeqCst)
        }

        async fn wait_for_low_watermark(&mut self) {
            while self.buffered_amount() > LOW_WATERMARK {
                self.send_dir.notify.notified().await;
            }
        }
    }

    fn channel_pair() -> (MockDataChannel, MockDataChannel) {
        let (tx_ab, rx_ab) = mpsc::unbounded_channel();
        let (tx_ba, rx_ba) = mpsc::unbounded_channel();
        let buf_ab = Arc::new(AtomicUsize::new(0));
        let buf_ba = Arc::new(AtomicUsize::new(0));
        let notify_ab = Arc::new(Notify::new());
        let notify_ba = Arc::new(Notify::new());

        let a = MockDataChannel {
            outbox: tx_ab,
            inbox: Mutex::new(rx_ba),
            send_dir: Direction {
                buffered: buf_ab.clone(),
                notify: notify_ab.clone(),
            },
            recv_dir: Direction {
                buffered: buf_ba.clone(),
                notify: notify_ba.clone(),
            },
        };
        let b = MockDataChannel {
            outbox: tx_ba,
            inbox: Mutex::new(rx_ab),
            send_dir: Direction {
                buffered: buf_ba,
                notify: notify_ba,
            },
            recv_dir: Direction {
                buffered: buf_ab,
                notify: notify_ab,
            },
        };
        (a, b)
    }

    /// An in-memory `PeerConnection`. `connected_pair` wires two of these
    /// together through a shared [`MockDataChannel`] pair so engine tests
    /// can drive both sides of a session without any real transport.
    pub struct MockPeerConnection {
        label: &'static str,
        local_candidates: VecDeque<OpaqueCandidate>,
        channel: MockDataChannel,
    }

    impl MockPeerConnection {
        /// Build a connected offerer/answerer pair, each preloaded with one
        /// host candidate to drain via `poll_local_candidate`.
        pub fn connected_pair() -> (Self, Self) {
            let (a, b) = channel_pair();
            let offerer = Self {
                label: "offerer",
                local_candidates: VecDeque::from(["candidate:host offerer".to_string()]),
                channel: a,
            };
            let answerer = Self {
                label: "answerer",
                local_candidates: VecDeque::from(["candidate:host answerer".to_string()]),
                channel: b,
            };
            (offerer, answerer)
        }
    }

    impl PeerConnection for MockPeerConnection {
        async fn create_offer(&mut self) -> OpaqueSdp {
            format!("mock-offer-sdp/{}", self.label)
        }

        async fn create_answer(&mut self) -> OpaqueSdp {
            format!("mock-answer-sdp/{}", self.label)
        }

        async fn set_local_description(&mut self, _sdp: &OpaqueSdp) {}

        async fn set_remote_description(&mut self, _sdp: &OpaqueSdp) -> Result<()> {
            Ok(())
        }

        async fn add_ice_candidate(&mut self, _candidate: &OpaqueCandidate) -> Result<()> {
            Ok(())
        }

        fn poll_local_candidate(&mut self) -> Option<OpaqueCandidate> {
            self.local_candidates.pop_front()
        }

        fn data_channel(&mut self) -> &mut dyn DataChannel {
            &mut self.channel
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockPeerConnection;
    use super::*;

    #[tokio::test]
    async fn mock_pair_exchanges_frames_in_order() {
        let (mut offerer, mut answerer) = MockPeerConnection::connected_pair();
        offerer
            .data_channel()
            .send(Frame::Data(vec![1, 2, 3]))
            .await
            .unwrap();
        offerer
            .data_channel()
            .send(Frame::Data(vec![4, 5]))
            .await
            .unwrap();

        let first = answerer.data_channel().recv().await.unwrap();
        let second = answerer.data_channel().recv().await.unwrap();
        assert!(matches!(first, Frame::Data(ref b) if b == &[1, 2, 3]));
        assert!(matches!(second, Frame::Data(ref b) if b == &[4, 5]));
    }

    #[tokio::test]
    async fn buffered_amount_drains_as_peer_receives() {
        let (mut offerer, mut answerer) = MockPeerConnection::connected_pair();
        offerer
            .data_channel()
            .send(Frame::Data(vec![0u8; 100]))
            .await
            .unwrap();
        assert_eq!(offerer.data_channel().buffered_amount(), 100);
        answerer.data_channel().recv().await.unwrap();
        assert_eq!(offerer.data_channel().buffered_amount(), 0);
    }

    #[tokio::test]
    async fn local_candidates_drain_then_exhaust() {
        let (mut offerer, _answerer) = MockPeerConnection::connected_pair();
        assert!(offerer.poll_local_candidate().is_some());
        assert!(offerer.poll_local_candidate().is_none());
    }
}
