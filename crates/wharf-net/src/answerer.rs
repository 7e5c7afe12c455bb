//! Answerer peer engine: accepts an offer, produces an answer, receives and
//! (optionally) decrypts chunks, and presents the final artifact.

use std::collections::VecDeque;

use wharf_crypto::symmetric::chunk::decrypt_chunk;
use wharf_protocol::wire::{ClientFrame, ControlFrame, OpaqueCandidate, OpaqueSdp, ServerFrame};

use crate::connection::{Frame, PeerConnection};

struct IncomingMeta {
    name: String,
    mime: String,
    encrypted: bool,
}

struct AnswererSession<C> {
    conn: C,
    peer_id: String,
    active_sid: u64,
    remote_desc_set: bool,
    pending_candidates: VecDeque<(u64, OpaqueCandidate)>,
    incoming_meta: Option<IncomingMeta>,
    buffer: Vec<u8>,
    bytes_received: u64,
    failed: bool,
}

/// Milestones the engine reports back to whatever is driving it (the
/// browser UI, a terminal progress bar, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswererEvent {
    /// A `meta` control frame arrived and is about to be followed by
    /// chunks.
    MetaReceived { name: String, size: u64, mime: String },
    /// `{type:"done"}` arrived; the reassembled artifact is ready.
    ArtifactReady {
        name: String,
        mime: String,
        data: Vec<u8>,
    },
    /// The current transfer failed locally (missing key or a decryption
    /// error). Further binary frames for this transfer are ignored until a
    /// new `meta` arrives.
    TransferFailed { reason: String },
}

/// Dormant until the first `offer` is observed, then drives exactly one
/// bound session at a time.
pub struct AnswererEngine<C> {
    session: Option<AnswererSession<C>>,
    signal_tx: tokio::sync::mpsc::UnboundedSender<ClientFrame>,
    key: Option<[u8; 32]>,
}

impl<C: PeerConnection> AnswererEngine<C> {
    /// `key` is the out-of-band 256-bit key carried in the URL fragment, if
    /// any. It is session-constant: the same key decrypts every chunk.
    pub fn new(signal_tx: tokio::sync::mpsc::UnboundedSender<ClientFrame>, key: Option<[u8; 32]>) -> Self {
        Self {
            session: None,
            signal_tx,
            key,
        }
    }

    /// Handle a relayed signalling frame. `make_connection` is only invoked
    /// when an `offer` actually re-enters the connection lifecycle.
    pub async fn handle_signal<F>(&mut self, frame: ServerFrame, make_connection: F)
    where
        F: FnOnce() -> C,
    {
        match frame {
            ServerFrame::Offer { from, sid, sdp } => self.handle_offer(from, sid, sdp, make_connection).await,
            ServerFrame::Candidate { from, sid, candidate } => self.handle_candidate(from, sid, candidate).await,
            _ => {}
        }
    }

    async fn handle_offer<F>(&mut self, from: String, sid: u64, sdp: OpaqueSdp, make_connection: F)
    where
        F: FnOnce() -> C,
    {
        if let Some(existing) = &self.session {
            if existing.peer_id != from || sid <= existing.active_sid {
                return;
            }
        }

        let carried_over = self.session.take().map(|s| s.pending_candidates).unwrap_or_default();

        let mut conn = make_connection();
        if let Err(err) = conn.set_remote_description(&sdp).await {
            tracing::warn!(peer = %from, error = %err, "failed to set remote description for offer");
            return;
        }
        let answer = conn.create_answer().await;
        conn.set_local_description(&answer).await;

        let mut session = AnswererSession {
            conn,
            peer_id: from.clone(),
            active_sid: sid,
            remote_desc_set: true,
            pending_candidates: VecDeque::new(),
            incoming_meta: None,
            buffer: Vec::new(),
            bytes_received: 0,
            failed: false,
        };

        for (csid, candidate) in carried_over {
            if csid != sid {
                continue;
            }
            if let Err(err) = session.conn.add_ice_candidate(&candidate).await {
                tracing::debug!(error = %err, "failed to add carried-over ice candidate");
            }
        }

        let _ = self.signal_tx.send(ClientFrame::Answer {
            to: from,
            sid,
            sdp: answer,
        });
        self.session = Some(session);
    }

    async fn handle_candidate(&mut self, from: String, sid: u64, candidate: OpaqueCandidate) {
        let Some(session) = &mut self.session else {
            return;
        };
        if session.peer_id != from {
            return;
        }
        if session.remote_desc_set && sid == session.active_sid {
            if let Err(err) = session.conn.add_ice_candidate(&candidate).await {
                tracing::debug!(peer = %from, error = %err, "failed to add ice candidate");
            }
        } else {
            session.pending_candidates.push_back((sid, candidate));
        }
    }

    /// Drain one locally gathered candidate as a `candidate` frame ready to
    /// send, if the bound session has one pending.
    pub fn poll_local_candidate(&mut self) -> Option<ClientFrame> {
        let session = self.session.as_mut()?;
        let candidate = session.conn.poll_local_candidate()?;
        Some(ClientFrame::Candidate {
            to: session.peer_id.clone(),
            sid: session.active_sid,
            candidate,
        })
    }

    /// Await the next reportable milestone on the bound data channel:
    /// arrival of a `meta` frame, artifact completion, or transfer failure.
    /// Plain chunk frames are absorbed and reassembled without being
    /// reported individually. Returns `None` once the session is gone or
    /// its channel has closed.
    pub async fn poll_data_channel(&mut self) -> Option<AnswererEvent> {
        loop {
            let session = self.session.as_mut()?;
            let frame = session.conn.data_channel().recv().await?;
            match frame {
                Frame::Control(ControlFrame::Meta {
                    name,
                    size,
                    mime,
                    encrypted,
                }) => {
                    session.buffer.clear();
                    session.bytes_received = 0;
                    session.failed = encrypted && self.key.is_none();
                    let event = if session.failed {
                        Some(AnswererEvent::TransferFailed {
                            reason: "transfer is encrypted but no key is available".into(),
                        })
                    } else {
                        Some(AnswererEvent::MetaReceived {
                            name: name.clone(),
                            size,
                            mime: mime.clone(),
                        })
                    };
                    session.incoming_meta = Some(IncomingMeta { name, mime, encrypted });
                    return event;
                }
                Frame::Control(ControlFrame::Done) => {
                    let Some(meta) = session.incoming_meta.take() else {
                        continue;
                    };
                    let data = std::mem::take(&mut session.buffer);
                    return Some(AnswererEvent::ArtifactReady {
                        name: meta.name,
                        mime: meta.mime,
                        data,
                    });
                }
                Frame::Data(bytes) => {
                    if session.failed {
                        continue;
                    }
                    let Some(meta) = &session.incoming_meta else {
                        continue;
                    };
                    let plaintext = if meta.encrypted {
                        let Some(key) = self.key else {
                            session.failed = true;
                            return Some(AnswererEvent::TransferFailed {
                                reason: "transfer is encrypted but no key is available".into(),
                            });
                        };
                        match decrypt_chunk(&key, &bytes) {
                            Ok(plaintext) => plaintext,
                            Err(err) => {
                                session.failed = true;
                                return Some(AnswererEvent::TransferFailed {
                                    reason: err.to_string(),
                                });
                            }
                        }
                    } else {
                        bytes
                    };
                    session.bytes_received += plaintext.len() as u64;
                    session.buffer.extend_from_slice(&plaintext);
                }
            }
        }
    }

    /// Total plaintext bytes reassembled for the in-progress transfer.
    pub fn bytes_received(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.bytes_received)
    }

    /// Whether the engine has bound to a sender yet.
    pub fn is_bound(&self) -> bool {
        self.session.is_some()
    }
}
