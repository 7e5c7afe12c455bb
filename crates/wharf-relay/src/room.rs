//! Room actor: one Tokio task per room, driven by a bounded `mpsc` command
//! channel, wrapping the synchronous [`wharf_protocol::room::Room`]
//! scheduler. No mutex is needed anywhere: the actor is the only place
//! `Room`'s state is ever touched, mirroring the teacher's single-writer
//! queue-actor pattern.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use wharf_protocol::room::{ConfigStore, DepartureOutcome, Role, Room, RoomConfig};
use wharf_protocol::wire::{ClientFrame, ServerFrame};

/// Commands accepted by a room actor. `reply`/`frame_tx` channels are how
/// the actor talks back to the WebSocket task that owns a given socket.
pub enum RoomCommand {
    /// A new WebSocket upgraded into this room.
    Join {
        cid: Option<String>,
        frame_tx: mpsc::UnboundedSender<ServerFrame>,
        evict_tx: oneshot::Sender<()>,
        reply: oneshot::Sender<JoinReply>,
    },
    /// A parsed client-to-server signalling frame.
    ClientFrame {
        cid: String,
        generation: u64,
        frame: ClientFrame,
    },
    /// The socket for `cid` closed.
    Disconnect { cid: String, generation: u64 },
}

/// Result of a successful `Join`.
pub struct JoinReply {
    pub cid: String,
    pub role: Role,
    pub generation: u64,
}

struct PeerHandle {
    frame_tx: mpsc::UnboundedSender<ServerFrame>,
    evict_tx: Option<oneshot::Sender<()>>,
}

/// Sender half handed out by the registry; the room actor itself is never
/// exposed outside this module.
pub type CommandSender = mpsc::UnboundedSender<RoomCommand>;

/// Maps room ids to their live actor's command sender.
pub struct RoomRegistry<S> {
    rooms: DashMap<String, CommandSender>,
    store: Arc<S>,
}

impl<S: ConfigStore + 'static> RoomRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            rooms: DashMap::new(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the live actor for `room_id`, spawning one (with config loaded
    /// from the store, or a fresh default) if none exists yet.
    pub fn get_or_spawn(self: &Arc<Self>, room_id: &str) -> CommandSender
    where
        S: Send + Sync,
    {
        if let Some(sender) = self.rooms.get(room_id) {
            return sender.clone();
        }
        let store = Arc::clone(&self.store);
        let room_id_owned = room_id.to_string();
        let registry = Arc::clone(self);
        let (tx, rx) = mpsc::unbounded_channel();
        self.rooms.insert(room_id.to_string(), tx.clone());
        tokio::spawn(async move {
            let config = store.load(&room_id_owned).await.unwrap_or_default();
            run_room(room_id_owned.clone(), config, rx).await;
            registry.rooms.remove(&room_id_owned);
        });
        tx
    }
}

async fn run_room(id: String, config: RoomConfig, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
    let mut room = Room::new(id.clone(), config);
    let mut peers: HashMap<String, PeerHandle> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RoomCommand::Join {
                cid,
                frame_tx,
                evict_tx,
                reply,
            } => {
                let outcome = room.admit(cid);

                if let Some(evicted_cid) = &outcome.evicted_cid {
                    if let Some(mut evicted) = peers.remove(evicted_cid) {
                        if let Some(tx) = evicted.evict_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                }

                peers.insert(
                    outcome.cid.clone(),
                    PeerHandle {
                        frame_tx: frame_tx.clone(),
                        evict_tx: Some(evict_tx),
                    },
                );

                let _ = reply.send(JoinReply {
                    cid: outcome.cid.clone(),
                    role: outcome.role,
                    generation: outcome.generation,
                });

                send_to(&peers, &outcome.cid, ServerFrame::Role {
                    role: outcome.role,
                    cid: outcome.cid.clone(),
                });
                if outcome.role == Role::Answerer {
                    send_to(&peers, &outcome.cid, ServerFrame::Wait { position: None });
                }
                broadcast_peers(&peers, outcome.peers_count);
                dispatch_fill_slots(&mut room, &peers);
            }

            RoomCommand::ClientFrame {
                cid,
                generation,
                frame,
            } => {
                let current = room.attachment(&cid).map(|a| a.generation);
                if current != Some(generation) {
                    continue;
                }
                handle_client_frame(&mut room, &peers, &cid, frame);
            }

            RoomCommand::Disconnect { cid, generation } => {
                match room.remove_socket(&cid, generation) {
                    DepartureOutcome::ReceiverLeft {
                        peer_id,
                        offerer_cid,
                        peers_count,
                    } => {
                        peers.remove(&cid);
                        if let Some(offerer) = offerer_cid {
                            send_to(&peers, &offerer, ServerFrame::PeerLeft { peer_id });
                        }
                        broadcast_peers(&peers, peers_count);
                        dispatch_fill_slots(&mut room, &peers);
                    }
                    DepartureOutcome::SenderLeft {
                        reset_receivers,
                        peers_count,
                    } => {
                        peers.remove(&cid);
                        for receiver in reset_receivers {
                            send_to(&peers, &receiver, ServerFrame::Wait { position: None });
                        }
                        broadcast_peers(&peers, peers_count);
                    }
                    DepartureOutcome::Stale { peers_count } => {
                        broadcast_peers(&peers, peers_count);
                    }
                }

                if room.peers_count() == 0 {
                    debug!(room = %id, "room empty, shutting down actor");
                    break;
                }
            }
        }
    }
}

fn handle_client_frame(room: &mut Room, peers: &HashMap<String, PeerHandle>, cid: &str, frame: ClientFrame) {
    match frame {
        ClientFrame::Offer { to, sid, sdp } => {
            if room.authorize_relay(cid, &to) {
                send_to(peers, &to, ServerFrame::Offer {
                    from: cid.to_string(),
                    sid,
                    sdp,
                });
            }
        }
        ClientFrame::Answer { to, sid, sdp } => {
            if room.authorize_relay(cid, &to) {
                send_to(peers, &to, ServerFrame::Answer {
                    from: cid.to_string(),
                    sid,
                    sdp,
                });
            }
        }
        ClientFrame::Candidate { to, sid, candidate } => {
            if room.authorize_relay(cid, &to) {
                send_to(peers, &to, ServerFrame::Candidate {
                    from: cid.to_string(),
                    sid,
                    candidate,
                });
            }
        }
        ClientFrame::TransferDone { peer_id } => {
            if room.accept_transfer_done(cid, &peer_id) {
                dispatch_fill_slots(room, peers);
            }
        }
    }
}

fn dispatch_fill_slots(room: &mut Room, peers: &HashMap<String, PeerHandle>) {
    let outcome = room.fill_slots();
    for promotion in outcome.promotions {
        send_to(peers, &promotion.receiver_cid, ServerFrame::Start { peer_id: None });
        send_to(peers, &promotion.offerer_cid, ServerFrame::Start {
            peer_id: Some(promotion.receiver_cid),
        });
    }
}

fn send_to(peers: &HashMap<String, PeerHandle>, cid: &str, frame: ServerFrame) {
    if let Some(peer) = peers.get(cid) {
        let _ = peer.frame_tx.send(frame);
    }
}

fn broadcast_peers(peers: &HashMap<String, PeerHandle>, count: usize) {
    for peer in peers.values() {
        let _ = peer.frame_tx.send(ServerFrame::Peers { count });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wharf_protocol::wire::OpaqueSdp;

    struct InMemoryStore(DashMap<String, RoomConfig>);

    impl ConfigStore for InMemoryStore {
        async fn load(&self, room_id: &str) -> Option<RoomConfig> {
            self.0.get(room_id).map(|r| r.clone())
        }
        async fn save(&self, room_id: &str, config: RoomConfig) {
            self.0.insert(room_id.to_string(), config);
        }
    }

    async fn join(tx: &CommandSender, cid: Option<&str>) -> (JoinReply, mpsc::UnboundedReceiver<ServerFrame>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (evict_tx, _evict_rx) = oneshot::channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(RoomCommand::Join {
            cid: cid.map(|c| c.to_string()),
            frame_tx,
            evict_tx,
            reply: reply_tx,
        })
        .unwrap();
        (reply_rx.await.unwrap(), frame_rx)
    }

    #[tokio::test]
    async fn first_joiner_becomes_offerer_and_second_gets_start() {
        let registry = Arc::new(RoomRegistry::new(Arc::new(InMemoryStore(DashMap::new()))));
        let tx = registry.get_or_spawn("room1");

        let (sender_reply, mut sender_frames) = join(&tx, Some("sender")).await;
        assert_eq!(sender_reply.role, Role::Offerer);
        assert!(matches!(sender_frames.recv().await, Some(ServerFrame::Role { .. })));
        assert!(matches!(sender_frames.recv().await, Some(ServerFrame::Peers { count: 1 })));

        let (receiver_reply, mut receiver_frames) = join(&tx, Some("receiver-a")).await;
        assert_eq!(receiver_reply.role, Role::Answerer);
        assert!(matches!(receiver_frames.recv().await, Some(ServerFrame::Role { .. })));
        assert!(matches!(receiver_frames.recv().await, Some(ServerFrame::Wait { .. })));
        assert!(matches!(receiver_frames.recv().await, Some(ServerFrame::Peers { count: 2 })));
        assert!(matches!(receiver_frames.recv().await, Some(ServerFrame::Start { peer_id: None })));

        assert!(matches!(sender_frames.recv().await, Some(ServerFrame::Peers { count: 2 })));
        match sender_frames.recv().await {
            Some(ServerFrame::Start { peer_id: Some(peer) }) => assert_eq!(peer, "receiver-a"),
            other => panic!("expected start with peer id, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_relay_is_dropped() {
        let registry = Arc::new(RoomRegistry::new(Arc::new(InMemoryStore(DashMap::new()))));
        let tx = registry.get_or_spawn("room2");

        let (_sender_reply, mut sender_frames) = join(&tx, Some("sender")).await;
        sender_frames.recv().await; // role
        sender_frames.recv().await; // peers

        let (_receiver_reply, mut receiver_frames) = join(&tx, Some("receiver-a")).await;
        for _ in 0..4 {
            receiver_frames.recv().await;
        }

        let sdp: OpaqueSdp = "bogus".into();
        tx.send(RoomCommand::ClientFrame {
            cid: "receiver-a".to_string(),
            generation: 2,
            frame: ClientFrame::Offer {
                to: "sender".into(),
                sid: 1,
                sdp,
            },
        })
        .unwrap();

        // sender should not receive a spoofed offer
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(sender_frames.try_recv().is_err());
    }
}
