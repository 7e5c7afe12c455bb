//! The room scheduler: pure state transitions for the waiting/active/done
//! queue and the signalling-relay authorization rules.
//!
//! This module has no knowledge of sockets, channels, or async runtimes.
//! The room actor (see the relay crate) owns one `Room` per room id,
//! applies inbound events to it, and turns the returned outcomes into
//! websocket sends. Keeping the state machine synchronous and side-effect
//! free is what makes the invariants in the specification's testable
//! properties section checkable without spinning up a server.

use std::collections::HashMap;

use super::config::RoomConfig;

/// The two roles a socket can hold in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single sender; drives the data channel.
    Offerer,
    /// A receiver; queued until promoted to `active`.
    Answerer,
}

/// States a receiver moves through. Offerer sockets have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// In the FIFO queue, not yet paired with the offerer.
    Waiting,
    /// Paired with the offerer; eligible for signalling relay.
    Active,
    /// Finished (via `transfer-done`); never re-activated.
    Done,
}

/// A live socket's attachment to a room.
#[derive(Debug, Clone)]
pub struct SocketAttachment {
    /// Stable client identifier, persisted across reconnects on the client.
    pub cid: String,
    /// Offerer or answerer.
    pub role: Role,
    /// `None` for the offerer; `Some` for answerers.
    pub state: Option<ReceiverState>,
    /// In-process monotonic join order, used as the FIFO queue key.
    pub joined_at: u64,
    /// Bumped on every admission under this `cid`; fences stale departures
    /// raised by a socket that has already been evicted by a reconnect.
    pub generation: u64,
}

/// Outcome of [`Room::admit`].
#[derive(Debug, Clone)]
pub struct AdmitOutcome {
    /// The cid assigned to this socket (echoes the request, or freshly minted).
    pub cid: String,
    /// The role assigned to this socket.
    pub role: Role,
    /// Generation fencing token for this admission.
    pub generation: u64,
    /// The cid of a socket evicted to make room for this one, if any.
    pub evicted_cid: Option<String>,
    /// Room membership count after admission.
    pub peers_count: usize,
}

/// One receiver promoted from `waiting` to `active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    /// The promoted receiver's cid.
    pub receiver_cid: String,
    /// The offerer's cid (for the sender-side `start{peerId}` frame).
    pub offerer_cid: String,
}

/// Outcome of [`Room::fill_slots`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillSlotsOutcome {
    /// Receivers promoted this pass, in promotion order.
    pub promotions: Vec<Promotion>,
}

/// Outcome of [`Room::remove_socket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartureOutcome {
    /// A receiver left; the offerer (if any) should be told `peer-left`.
    ReceiverLeft {
        /// The departing receiver's cid.
        peer_id: String,
        /// The offerer it was paired with, if it was active.
        offerer_cid: Option<String>,
        /// Room membership count after departure.
        peers_count: usize,
    },
    /// The offerer left; every active receiver is reset to `waiting`.
    SenderLeft {
        /// Receivers moved back to `waiting`, in no particular order.
        reset_receivers: Vec<String>,
        /// Room membership count after departure.
        peers_count: usize,
    },
    /// The closing socket had already been evicted by a reconnect under the
    /// same cid; nothing changed except possibly needing a `peers` echo.
    Stale {
        /// Room membership count (unchanged by this call).
        peers_count: usize,
    },
}

/// The authoritative per-room state: role assignment, queue, active pairs.
#[derive(Debug)]
pub struct Room {
    /// This room's id.
    pub id: String,
    /// Seeded configuration; immutable after creation.
    pub config: RoomConfig,
    sockets: HashMap<String, SocketAttachment>,
    active_pairs: HashMap<String, String>,
    join_counter: u64,
    generation_counter: u64,
}

impl Room {
    /// Create a fresh room with the given id and configuration.
    pub fn new(id: String, config: RoomConfig) -> Self {
        Self {
            id,
            config,
            sockets: HashMap::new(),
            active_pairs: HashMap::new(),
            join_counter: 0,
            generation_counter: 0,
        }
    }

    /// Number of live sockets.
    pub fn peers_count(&self) -> usize {
        self.sockets.len()
    }

    /// Look up a socket's attachment.
    pub fn attachment(&self, cid: &str) -> Option<&SocketAttachment> {
        self.sockets.get(cid)
    }

    /// Whether any socket currently holds the offerer role.
    pub fn has_offerer(&self) -> bool {
        self.sockets.values().any(|a| a.role == Role::Offerer)
    }

    /// Admit a new socket, assigning it a role and (if a same-cid socket was
    /// already present) evicting the prior one. Mints a cid if none was
    /// supplied. Does not run the slot filler -- call [`Room::fill_slots`]
    /// afterwards.
    pub fn admit(&mut self, requested_cid: Option<String>) -> AdmitOutcome {
        let cid = requested_cid.unwrap_or_else(mint_cid);

        let evicted_cid = if self.sockets.remove(&cid).is_some() {
            self.active_pairs.remove(&cid);
            Some(cid.clone())
        } else {
            None
        };

        let role = match &self.config.creator_cid {
            Some(creator) if *creator == cid => Role::Offerer,
            Some(_) => Role::Answerer,
            None => {
                if self.has_offerer() {
                    Role::Answerer
                } else {
                    Role::Offerer
                }
            }
        };

        self.join_counter += 1;
        self.generation_counter += 1;

        let attachment = SocketAttachment {
            cid: cid.clone(),
            role,
            state: (role == Role::Answerer).then_some(ReceiverState::Waiting),
            joined_at: self.join_counter,
            generation: self.generation_counter,
        };
        self.sockets.insert(cid.clone(), attachment);

        AdmitOutcome {
            cid,
            role,
            generation: self.generation_counter,
            evicted_cid,
            peers_count: self.sockets.len(),
        }
    }

    /// Promote as many waiting receivers as the concurrency ceiling allows.
    /// Ties in `joined_at` broken by ascending cid for determinism.
    pub fn fill_slots(&mut self) -> FillSlotsOutcome {
        let Some(offerer_cid) = self
            .sockets
            .values()
            .find(|a| a.role == Role::Offerer)
            .map(|a| a.cid.clone())
        else {
            return FillSlotsOutcome::default();
        };

        let active_count = self
            .sockets
            .values()
            .filter(|a| a.state == Some(ReceiverState::Active))
            .count();
        let available = (self.config.max_concurrent as usize).saturating_sub(active_count);
        if available == 0 {
            return FillSlotsOutcome::default();
        }

        let mut waiting: Vec<&SocketAttachment> = self
            .sockets
            .values()
            .filter(|a| a.state == Some(ReceiverState::Waiting))
            .collect();
        waiting.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.cid.cmp(&b.cid)));

        let promoted_cids: Vec<String> = waiting
            .into_iter()
            .take(available)
            .map(|a| a.cid.clone())
            .collect();

        let mut promotions = Vec::with_capacity(promoted_cids.len());
        for receiver_cid in promoted_cids {
            if let Some(att) = self.sockets.get_mut(&receiver_cid) {
                att.state = Some(ReceiverState::Active);
            }
            self.active_pairs
                .insert(receiver_cid.clone(), offerer_cid.clone());
            promotions.push(Promotion {
                receiver_cid,
                offerer_cid: offerer_cid.clone(),
            });
        }

        FillSlotsOutcome { promotions }
    }

    /// Whether a signalling frame (`offer`/`answer`/`candidate`) from
    /// `origin_cid` addressed `to` is authorized for relay. The rule is
    /// symmetric: it depends only on the origin's role and the active
    /// pairing, not on which of the three frame kinds is being relayed.
    pub fn authorize_relay(&self, origin_cid: &str, to: &str) -> bool {
        match self.sockets.get(origin_cid).map(|a| a.role) {
            Some(Role::Offerer) => self.active_pairs.get(to).map(String::as_str) == Some(origin_cid),
            Some(Role::Answerer) => self.active_pairs.get(origin_cid).map(String::as_str) == Some(to),
            None => false,
        }
    }

    /// Accept a `transfer-done{peerId}` frame. Must originate from the
    /// offerer. Returns `true` if the named receiver transitioned to
    /// `done` (a repeat call for an already-`done` receiver is a no-op and
    /// returns `false`).
    pub fn accept_transfer_done(&mut self, origin_cid: &str, peer_id: &str) -> bool {
        if self.sockets.get(origin_cid).map(|a| a.role) != Some(Role::Offerer) {
            return false;
        }
        match self.sockets.get_mut(peer_id) {
            Some(att) if att.state == Some(ReceiverState::Active) => {
                att.state = Some(ReceiverState::Done);
                true
            }
            _ => false,
        }
    }

    /// Remove a socket that has closed. `generation` must match the
    /// generation recorded at admission time; a mismatch means this socket
    /// was already evicted by a reconnect under the same cid, and the
    /// closure is reported as [`DepartureOutcome::Stale`].
    pub fn remove_socket(&mut self, cid: &str, generation: u64) -> DepartureOutcome {
        if self.sockets.get(cid).map(|a| a.generation) != Some(generation) {
            return DepartureOutcome::Stale {
                peers_count: self.sockets.len(),
            };
        }

        let attachment = self.sockets.remove(cid).expect("checked above");
        match attachment.role {
            Role::Answerer => {
                let offerer_cid = self.active_pairs.remove(cid);
                DepartureOutcome::ReceiverLeft {
                    peer_id: cid.to_string(),
                    offerer_cid,
                    peers_count: self.sockets.len(),
                }
            }
            Role::Offerer => {
                let mut reset_receivers = Vec::new();
                self.active_pairs.retain(|receiver_cid, offerer| {
                    if offerer == cid {
                        reset_receivers.push(receiver_cid.clone());
                        false
                    } else {
                        true
                    }
                });
                for receiver_cid in &reset_receivers {
                    if let Some(att) = self.sockets.get_mut(receiver_cid) {
                        att.state = Some(ReceiverState::Waiting);
                    }
                }
                DepartureOutcome::SenderLeft {
                    reset_receivers,
                    peers_count: self.sockets.len(),
                }
            }
        }
    }
}

/// Mint a fresh client id when a socket connects without one. Not part of
/// the room-id alphabet contract (`cid` is an internal bookkeeping key, not
/// a URL-facing identifier), so a wider hex alphabet is used.
fn mint_cid() -> String {
    use rand::rngs::OsRng;
    use rand::RngCore;

    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_with(max_concurrent: u32) -> Room {
        Room::new("TESTROOM01".into(), RoomConfig::new(Some(max_concurrent), None))
    }

    #[test]
    fn first_joiner_is_offerer() {
        let mut room = room_with(3);
        let out = room.admit(Some("sender".into()));
        assert_eq!(out.role, Role::Offerer);
        assert_eq!(out.evicted_cid, None);
    }

    #[test]
    fn second_joiner_is_answerer() {
        let mut room = room_with(3);
        room.admit(Some("sender".into()));
        let out = room.admit(Some("receiver-a".into()));
        assert_eq!(out.role, Role::Answerer);
    }

    #[test]
    fn at_most_one_offerer() {
        let mut room = room_with(3);
        room.admit(Some("sender".into()));
        let out = room.admit(Some("sender2".into()));
        assert_eq!(out.role, Role::Answerer, "second socket cannot also be offerer");
    }

    #[test]
    fn creator_pin_assigns_offerer_role_regardless_of_join_order() {
        let mut room = Room::new("TESTROOM02".into(), RoomConfig::new(Some(3), Some("creator".into())));
        let first = room.admit(Some("receiver-a".into()));
        assert_eq!(first.role, Role::Answerer);
        let second = room.admit(Some("creator".into()));
        assert_eq!(second.role, Role::Offerer);
    }

    #[test]
    fn s1_single_receiver_gets_promoted() {
        let mut room = room_with(3);
        room.admit(Some("sender".into()));
        room.admit(Some("a".into()));
        let out = room.fill_slots();
        assert_eq!(out.promotions.len(), 1);
        assert_eq!(out.promotions[0].receiver_cid, "a");
        assert!(room.authorize_relay("sender", "a"));
        assert!(room.authorize_relay("a", "sender"));
    }

    #[test]
    fn s2_queueing_promotes_in_fifo_order_then_advances_on_done() {
        let mut room = room_with(2);
        room.admit(Some("sender".into()));
        room.admit(Some("a".into()));
        room.admit(Some("b".into()));
        room.admit(Some("c".into()));

        let out = room.fill_slots();
        let promoted: Vec<&str> = out.promotions.iter().map(|p| p.receiver_cid.as_str()).collect();
        assert_eq!(promoted, vec!["a", "b"]);
        assert_eq!(room.attachment("c").unwrap().state, Some(ReceiverState::Waiting));

        assert!(room.accept_transfer_done("sender", "a"));
        assert_eq!(room.attachment("a").unwrap().state, Some(ReceiverState::Done));

        let out2 = room.fill_slots();
        assert_eq!(out2.promotions[0].receiver_cid, "c");
        assert_eq!(room.attachment("b").unwrap().state, Some(ReceiverState::Active));
    }

    #[test]
    fn transfer_done_is_idempotent() {
        let mut room = room_with(3);
        room.admit(Some("sender".into()));
        room.admit(Some("a".into()));
        room.fill_slots();

        assert!(room.accept_transfer_done("sender", "a"));
        assert!(!room.accept_transfer_done("sender", "a"), "repeat done is a no-op");
    }

    #[test]
    fn transfer_done_only_accepted_from_offerer() {
        let mut room = room_with(3);
        room.admit(Some("sender".into()));
        room.admit(Some("a".into()));
        room.fill_slots();

        assert!(!room.accept_transfer_done("a", "a"), "answerer cannot self-report done");
    }

    #[test]
    fn s3_sender_departure_resets_active_receivers_to_waiting() {
        let mut room = room_with(3);
        let sender = room.admit(Some("sender".into()));
        room.admit(Some("a".into()));
        room.admit(Some("b".into()));
        room.fill_slots();

        let out = room.remove_socket("sender", sender.generation);
        match out {
            DepartureOutcome::SenderLeft { mut reset_receivers, .. } => {
                reset_receivers.sort();
                assert_eq!(reset_receivers, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected SenderLeft, got {other:?}"),
        }
        assert_eq!(room.attachment("a").unwrap().state, Some(ReceiverState::Waiting));
        assert!(!room.authorize_relay("a", "sender"));
    }

    #[test]
    fn receiver_departure_frees_a_slot_for_the_next_waiter() {
        let mut room = room_with(1);
        room.admit(Some("sender".into()));
        let a = room.admit(Some("a".into()));
        room.admit(Some("b".into()));
        room.fill_slots();
        assert_eq!(room.attachment("b").unwrap().state, Some(ReceiverState::Waiting));

        let out = room.remove_socket("a", a.generation);
        match out {
            DepartureOutcome::ReceiverLeft { peer_id, offerer_cid, .. } => {
                assert_eq!(peer_id, "a");
                assert_eq!(offerer_cid.as_deref(), Some("sender"));
            }
            other => panic!("expected ReceiverLeft, got {other:?}"),
        }

        let out2 = room.fill_slots();
        assert_eq!(out2.promotions[0].receiver_cid, "b");
    }

    #[test]
    fn stale_departure_from_an_evicted_generation_is_ignored() {
        let mut room = room_with(3);
        let first = room.admit(Some("sender".into()));
        let _second = room.admit(Some("sender".into())); // reconnect, evicts first

        let out = room.remove_socket("sender", first.generation);
        assert!(matches!(out, DepartureOutcome::Stale { .. }));
        assert!(room.has_offerer(), "the reconnected socket must still be present");
    }

    #[test]
    fn unauthorized_relay_is_rejected() {
        let mut room = room_with(1);
        room.admit(Some("sender".into()));
        room.admit(Some("a".into()));
        room.admit(Some("b".into()));
        room.fill_slots();

        assert_eq!(room.attachment("b").unwrap().state, Some(ReceiverState::Waiting));
        assert!(!room.authorize_relay("sender", "b"), "b is not active yet");
        assert!(!room.authorize_relay("b", "sender"));
    }

    #[test]
    fn reconnecting_offerer_preserves_pairs_for_still_connected_receivers() {
        let mut room = room_with(3);
        room.admit(Some("sender".into()));
        room.admit(Some("a".into()));
        room.fill_slots();
        assert!(room.authorize_relay("sender", "a"));

        room.admit(Some("sender".into())); // reload, same cid
        assert!(
            room.authorize_relay("sender", "a"),
            "activePairs keyed by cid survive a same-cid reconnect"
        );
    }
}
