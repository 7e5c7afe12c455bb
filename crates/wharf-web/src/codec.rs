//! JSON bridge for the signalling wire frames.
//!
//! The rendezvous WebSocket speaks JSON, so JS already gets `ServerFrame`
//! for free via `JSON.parse`. These helpers exist for the one direction
//! that benefits from server-side validation before the frame leaves the
//! browser: building a well-formed `ClientFrame` from loose JS values.

use wasm_bindgen::prelude::*;

use wharf_protocol::wire::ClientFrame;

/// Build a JSON-encoded `offer` client frame.
#[wasm_bindgen(js_name = "encodeOffer")]
pub fn encode_offer(to: String, sid: u64, sdp: String) -> Result<String, JsValue> {
    encode(ClientFrame::Offer { to, sid, sdp })
}

/// Build a JSON-encoded `answer` client frame.
#[wasm_bindgen(js_name = "encodeAnswer")]
pub fn encode_answer(to: String, sid: u64, sdp: String) -> Result<String, JsValue> {
    encode(ClientFrame::Answer { to, sid, sdp })
}

/// Build a JSON-encoded `candidate` client frame.
#[wasm_bindgen(js_name = "encodeCandidate")]
pub fn encode_candidate(to: String, sid: u64, candidate: String) -> Result<String, JsValue> {
    encode(ClientFrame::Candidate { to, sid, candidate })
}

/// Build a JSON-encoded `transfer-done` client frame.
#[wasm_bindgen(js_name = "encodeTransferDone")]
pub fn encode_transfer_done(peer_id: String) -> Result<String, JsValue> {
    encode(ClientFrame::TransferDone { peer_id })
}

fn encode(frame: ClientFrame) -> Result<String, JsValue> {
    serde_json::to_string(&frame).map_err(|e| JsValue::from_str(&format!("encode client frame: {e}")))
}
