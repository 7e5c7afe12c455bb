//! Offerer peer engine: owns one connection per active receiver, pushes the
//! selected artifact over each data channel, and coordinates backpressure.

use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc;

use wharf_crypto::symmetric::chunk::encrypt_chunk;
use wharf_protocol::wire::{
    ClientFrame, ControlFrame, OpaqueCandidate, OpaqueSdp, ServerFrame, CHUNK_SIZE, HIGH_WATERMARK,
};

use crate::connection::{DataChannel, Frame, PeerConnection};
use crate::error::Result;

struct PeerSession<C> {
    conn: C,
    signal_sid: u64,
    active_sid: Option<u64>,
    remote_desc_set: bool,
    pending_candidates: VecDeque<(u64, OpaqueCandidate)>,
    offer_in_flight: bool,
    sending: bool,
    sent: bool,
}

impl<C: PeerConnection> PeerSession<C> {
    fn new(conn: C) -> Self {
        Self {
            conn,
            signal_sid: 0,
            active_sid: None,
            remote_desc_set: false,
            pending_candidates: VecDeque::new(),
            offer_in_flight: false,
            sending: false,
            sent: false,
        }
    }
}

/// Drives one outbound connection per active receiver.
///
/// Generic over the concrete [`PeerConnection`] binding so the same state
/// machine runs against the in-memory mock in tests and a real WebRTC
/// binding in `wharf-web`.
pub struct OffererEngine<C> {
    peers: HashMap<String, PeerSession<C>>,
    signal_tx: mpsc::UnboundedSender<ClientFrame>,
}

impl<C: PeerConnection> OffererEngine<C> {
    /// Build an engine that emits outgoing signalling frames on `signal_tx`.
    pub fn new(signal_tx: mpsc::UnboundedSender<ClientFrame>) -> Self {
        Self {
            peers: HashMap::new(),
            signal_tx,
        }
    }

    /// Handle `start{peerId}`: tear down any existing session for the peer,
    /// construct a fresh connection via `make_connection`, and issue an
    /// offer.
    pub async fn start_peer<F>(&mut self, peer_id: String, make_connection: F)
    where
        F: FnOnce() -> C,
    {
        self.peers.remove(&peer_id);
        let mut session = PeerSession::new(make_connection());
        self.issue_offer(&peer_id, &mut session).await;
        self.peers.insert(peer_id, session);
    }

    async fn issue_offer(&self, peer_id: &str, session: &mut PeerSession<C>) {
        if session.offer_in_flight {
            return;
        }
        session.offer_in_flight = true;
        let sid = session.signal_sid + 1;
        session.signal_sid = sid;
        session.active_sid = Some(sid);
        session.remote_desc_set = false;
        session.pending_candidates.clear();

        let sdp = session.conn.create_offer().await;
        session.conn.set_local_description(&sdp).await;
        session.offer_in_flight = false;

        let _ = self.signal_tx.send(ClientFrame::Offer {
            to: peer_id.to_string(),
            sid,
            sdp,
        });
    }

    /// Handle a relayed signalling frame. Frames this engine has no
    /// business with (`role`, `peers`, `wait`, `start`, any offer/answer it
    /// did not expect) are silently ignored.
    pub async fn handle_signal(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Answer { from, sid, sdp } => self.handle_answer(from, sid, sdp).await,
            ServerFrame::Candidate {
                from,
                sid,
                candidate,
            } => self.handle_candidate(from, sid, candidate).await,
            ServerFrame::PeerLeft { peer_id } => {
                self.peers.remove(&peer_id);
            }
            _ => {}
        }
    }

    async fn handle_answer(&mut self, from: String, sid: u64, sdp: OpaqueSdp) {
        let Some(session) = self.peers.get_mut(&from) else {
            return;
        };
        if session.active_sid != Some(sid) {
            return;
        }
        if let Err(err) = session.conn.set_remote_description(&sdp).await {
            tracing::warn!(peer = %from, error = %err, "failed to set remote description");
            return;
        }
        session.remote_desc_set = true;
        drain_candidates(session).await;
    }

    async fn handle_candidate(&mut self, from: String, sid: u64, candidate: OpaqueCandidate) {
        let Some(session) = self.peers.get_mut(&from) else {
            return;
        };
        if session.active_sid != Some(sid) {
            return;
        }
        if session.remote_desc_set {
            if let Err(err) = session.conn.add_ice_candidate(&candidate).await {
                tracing::debug!(peer = %from, error = %err, "failed to add ice candidate");
            }
        } else {
            session.pending_candidates.push_back((sid, candidate));
        }
    }

    /// Drain every pending local candidate across all peers into
    /// `candidate` frames ready to send. Candidates generated while a
    /// peer's `activeSid` is unset are dropped.
    pub fn poll_local_candidates(&mut self) -> Vec<ClientFrame> {
        let mut out = Vec::new();
        for (peer_id, session) in self.peers.iter_mut() {
            while let Some(candidate) = session.conn.poll_local_candidate() {
                if let Some(sid) = session.active_sid {
                    out.push(ClientFrame::Candidate {
                        to: peer_id.clone(),
                        sid,
                        candidate,
                    });
                }
            }
        }
        out
    }

    /// Reset the per-peer `sending`/`sent` guards across every session, as
    /// happens when the operator selects a new file to send.
    pub fn reset_selection(&mut self) {
        for session in self.peers.values_mut() {
            session.sending = false;
            session.sent = false;
        }
    }

    /// Stream `data` to `peer_id` over its data channel: a `meta` control
    /// frame, the chunked (optionally encrypted) payload, a `done` control
    /// frame, then `transfer-done` on the signalling socket.
    ///
    /// No-ops if this peer has no session, is already sending, or has
    /// already sent the current selection.
    pub async fn send_file(
        &mut self,
        peer_id: &str,
        name: String,
        mime: String,
        key: Option<[u8; 32]>,
        data: &[u8],
    ) -> Result<()> {
        let Some(session) = self.peers.get_mut(peer_id) else {
            return Ok(());
        };
        if session.sending || session.sent {
            return Ok(());
        }
        session.sending = true;

        let channel = session.conn.data_channel();
        channel
            .send(Frame::Control(ControlFrame::Meta {
                name,
                size: data.len() as u64,
                mime,
                encrypted: key.is_some(),
            }))
            .await?;

        for plaintext in data.chunks(CHUNK_SIZE) {
            if channel.buffered_amount() > HIGH_WATERMARK {
                channel.wait_for_low_watermark().await;
            }
            let payload = match key {
                Some(k) => encrypt_chunk(&k, plaintext)?,
                None => plaintext.to_vec(),
            };
            channel.send(Frame::Data(payload)).await?;
        }

        channel.send(Frame::Control(ControlFrame::Done)).await?;

        let _ = self.signal_tx.send(ClientFrame::TransferDone {
            peer_id: peer_id.to_string(),
        });

        let session = self
            .peers
            .get_mut(peer_id)
            .expect("session present: verified above and not removed by awaited sends");
        session.sending = false;
        session.sent = true;
        Ok(())
    }

    /// Number of sessions currently tracked, for diagnostics and tests.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

async fn drain_candidates<C: PeerConnection>(session: &mut PeerSession<C>) {
    let active = session.active_sid;
    while let Some((sid, candidate)) = session.pending_candidates.pop_front() {
        if Some(sid) != active {
            continue;
        }
        if let Err(err) = session.conn.add_ice_candidate(&candidate).await {
            tracing::debug!(error = %err, "failed to add buffered ice candidate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockPeerConnection;

    fn test_engine() -> (
        OffererEngine<MockPeerConnection>,
        mpsc::UnboundedReceiver<ClientFrame>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (OffererEngine::new(tx), rx)
    }

    #[tokio::test]
    async fn start_peer_emits_an_offer_with_sid_one() {
        let (mut engine, mut rx) = test_engine();
        let (offerer_conn, _answerer_conn) = MockPeerConnection::connected_pair();
        engine.start_peer("peer-a".into(), || offerer_conn).await;

        match rx.try_recv().unwrap() {
            ClientFrame::Offer { to, sid, .. } => {
                assert_eq!(to, "peer-a");
                assert_eq!(sid, 1);
            }
            other => panic!("expected offer, got {other:?}"),
        }
        assert_eq!(engine.peer_count(), 1);
    }

    #[tokio::test]
    async fn stale_answer_is_ignored() {
        let (mut engine, _rx) = test_engine();
        let (offerer_conn, _answerer_conn) = MockPeerConnection::connected_pair();
        engine.start_peer("peer-a".into(), || offerer_conn).await;

        engine
            .handle_signal(ServerFrame::Answer {
                from: "peer-a".into(),
                sid: 999,
                sdp: "stale".into(),
            })
            .await;

        let session = engine.peers.get("peer-a").unwrap();
        assert!(!session.remote_desc_set);
    }

    #[tokio::test]
    async fn fresh_answer_marks_remote_desc_set_and_drains_candidates() {
        let (mut engine, _rx) = test_engine();
        let (offerer_conn, _answerer_conn) = MockPeerConnection::connected_pair();
        engine.start_peer("peer-a".into(), || offerer_conn).await;

        engine
            .handle_signal(ServerFrame::Candidate {
                from: "peer-a".into(),
                sid: 1,
                candidate: "cand-1".into(),
            })
            .await;
        assert_eq!(engine.peers.get("peer-a").unwrap().pending_candidates.len(), 1);

        engine
            .handle_signal(ServerFrame::Answer {
                from: "peer-a".into(),
                sid: 1,
                sdp: "answer-sdp".into(),
            })
            .await;

        let session = engine.peers.get("peer-a").unwrap();
        assert!(session.remote_desc_set);
        assert!(session.pending_candidates.is_empty());
    }

    #[tokio::test]
    async fn peer_left_tears_down_the_session() {
        let (mut engine, _rx) = test_engine();
        let (offerer_conn, _answerer_conn) = MockPeerConnection::connected_pair();
        engine.start_peer("peer-a".into(), || offerer_conn).await;
        engine
            .handle_signal(ServerFrame::PeerLeft {
                peer_id: "peer-a".into(),
            })
            .await;
        assert_eq!(engine.peer_count(), 0);
    }

    #[tokio::test]
    async fn send_file_streams_meta_chunks_and_done_then_transfer_done() {
        let (mut engine, mut rx) = test_engine();
        let (mut offerer_conn, mut answerer_conn) = MockPeerConnection::connected_pair();
        let _ = offerer_conn.poll_local_candidate();
        let _ = answerer_conn.poll_local_candidate();
        engine.start_peer("peer-a".into(), || offerer_conn).await;
        let _offer = rx.try_recv().unwrap();

        let data = vec![7u8; CHUNK_SIZE * 2 + 10];
        engine
            .send_file("peer-a", "f.bin".into(), "application/octet-stream".into(), None, &data)
            .await
            .unwrap();

        let meta = answerer_conn.data_channel().recv().await.unwrap();
        assert!(matches!(meta, Frame::Control(ControlFrame::Meta { size, .. }) if size == data.len() as u64));
        let chunk1 = answerer_conn.data_channel().recv().await.unwrap();
        assert!(matches!(chunk1, Frame::Data(ref b) if b.len() == CHUNK_SIZE));
        let chunk2 = answerer_conn.data_channel().recv().await.unwrap();
        assert!(matches!(chunk2, Frame::Data(ref b) if b.len() == CHUNK_SIZE));
        let chunk3 = answerer_conn.data_channel().recv().await.unwrap();
        assert!(matches!(chunk3, Frame::Data(ref b) if b.len() == 10));
        let done = answerer_conn.data_channel().recv().await.unwrap();
        assert!(matches!(done, Frame::Control(ControlFrame::Done)));

        match rx.try_recv().unwrap() {
            ClientFrame::TransferDone { peer_id } => assert_eq!(peer_id, "peer-a"),
            other => panic!("expected transfer-done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_file_is_a_no_op_once_already_sent() {
        let (mut engine, mut rx) = test_engine();
        let (offerer_conn, mut answerer_conn) = MockPeerConnection::connected_pair();
        engine.start_peer("peer-a".into(), || offerer_conn).await;
        let _offer = rx.try_recv().unwrap();

        let data = vec![1u8; 4];
        engine
            .send_file("peer-a", "a".into(), "text/plain".into(), None, &data)
            .await
            .unwrap();
        // meta, one chunk, done
        for _ in 0..3 {
            answerer_conn.data_channel().recv().await.unwrap();
        }
        assert!(matches!(rx.try_recv(), Ok(ClientFrame::TransferDone { .. })));

        engine
            .send_file("peer-a", "a".into(), "text/plain".into(), None, &data)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}
