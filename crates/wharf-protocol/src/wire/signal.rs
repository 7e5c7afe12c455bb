//! Signalling frames exchanged over the rendezvous WebSocket.
//!
//! Split into one enum per direction rather than a single frame type with
//! optional fields: a relayed `offer` carries `from`, a client-originated
//! `offer` carries `to`, and conflating the two invites a frame that is
//! structurally valid but means nothing (both fields set, or neither).

use serde::{Deserialize, Serialize};

use crate::room::Role;

/// Opaque SDP blob; this crate never parses it, only relays it.
pub type OpaqueSdp = String;
/// Opaque ICE candidate blob; relayed verbatim.
pub type OpaqueCandidate = String;

/// Frames a client sends to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// A WebRTC offer addressed to one receiver, scoped by `sid`.
    #[serde(rename_all = "camelCase")]
    Offer {
        to: String,
        sid: u64,
        sdp: OpaqueSdp,
    },
    /// A WebRTC answer addressed to the offerer, scoped by `sid`.
    #[serde(rename_all = "camelCase")]
    Answer {
        to: String,
        sid: u64,
        sdp: OpaqueSdp,
    },
    /// An ICE candidate addressed to the partner, scoped by `sid`.
    #[serde(rename_all = "camelCase")]
    Candidate {
        to: String,
        sid: u64,
        candidate: OpaqueCandidate,
    },
    /// Sent by the offerer once a receiver's transfer has fully streamed.
    #[serde(rename = "transfer-done", rename_all = "camelCase")]
    TransferDone { peer_id: String },
}

/// Frames the room sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Role assignment, sent once right after admission.
    Role { role: Role, cid: String },
    /// Current room membership count, broadcast on every join/leave.
    Peers { count: usize },
    /// Told to a receiver while it sits in the queue.
    Wait {
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
    /// Promotion to `active`. The offerer's copy carries `peer_id`; the
    /// promoted receiver's copy carries none.
    #[serde(rename_all = "camelCase")]
    Start {
        #[serde(skip_serializing_if = "Option::is_none")]
        peer_id: Option<String>,
    },
    /// A paired receiver disconnected.
    #[serde(rename = "peer-left", rename_all = "camelCase")]
    PeerLeft { peer_id: String },
    /// A relayed offer, re-addressed from the sender.
    Offer {
        from: String,
        sid: u64,
        sdp: OpaqueSdp,
    },
    /// A relayed answer, re-addressed from the receiver.
    Answer {
        from: String,
        sid: u64,
        sdp: OpaqueSdp,
    },
    /// A relayed ICE candidate, re-addressed from whichever side sent it.
    Candidate {
        from: String,
        sid: u64,
        candidate: OpaqueCandidate,
    },
}

impl ClientFrame {
    /// The `to` field carried by every frame kind except `transfer-done`,
    /// which has no partner address (it implicitly targets the room).
    pub fn to(&self) -> Option<&str> {
        match self {
            ClientFrame::Offer { to, .. }
            | ClientFrame::Answer { to, .. }
            | ClientFrame::Candidate { to, .. } => Some(to),
            ClientFrame::TransferDone { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_offer_round_trips_through_json() {
        let frame = ClientFrame::Offer {
            to: "receiver-1".into(),
            sid: 1,
            sdp: "v=0...".into(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"offer\""));
        let back: ClientFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, back);
    }

    #[test]
    fn transfer_done_uses_camel_case_peer_id() {
        let frame = ClientFrame::TransferDone { peer_id: "a".into() };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"transfer-done","peerId":"a"}"#);
    }

    #[test]
    fn server_transfer_done_is_rejected_as_a_server_frame() {
        // transfer-done is client -> server only; ServerFrame has no variant
        // for it, so decoding one as a ServerFrame must fail.
        let json = r#"{"type":"transfer-done","peerId":"a"}"#;
        assert!(serde_json::from_str::<ServerFrame>(json).is_err());
    }

    #[test]
    fn server_peer_left_uses_kebab_case_tag() {
        let frame = ServerFrame::PeerLeft { peer_id: "a".into() };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"peer-left\""));
        assert!(json.contains("\"peerId\":\"a\""));
    }

    #[test]
    fn wait_omits_position_when_absent() {
        let frame = ServerFrame::Wait { position: None };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"wait"}"#);
    }

    #[test]
    fn role_frame_serializes_role_as_lowercase_string() {
        let frame = ServerFrame::Role {
            role: Role::Offerer,
            cid: "c1".into(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"role","role":"offerer","cid":"c1"}"#);
    }

    #[test]
    fn unknown_frame_type_fails_to_parse() {
        let json = r#"{"type":"not-a-real-frame"}"#;
        assert!(serde_json::from_str::<ClientFrame>(json).is_err());
    }
}
