//! Browser WebRTC binding: implements the `wharf-net` `PeerConnection`/
//! `DataChannel` contract on top of `web_sys::RtcPeerConnection`.
//!
//! Mirrors the in-memory mock in `wharf_net::connection::mock` one level
//! down: callbacks registered on the underlying `RtcPeerConnection` and
//! `RtcDataChannel` feed the same local-candidate queue and frame channel
//! shapes the engines already drive against the mock in their own tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use js_sys::Uint8Array;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    MessageEvent, RtcConfiguration, RtcDataChannel, RtcDataChannelEvent, RtcDataChannelInit,
    RtcDataChannelState, RtcIceCandidateInit, RtcIceServer, RtcPeerConnection,
    RtcPeerConnectionIceEvent, RtcSdpType, RtcSessionDescriptionInit,
};

use wharf_net::connection::{DataChannel, Frame, PeerConnection};
use wharf_net::error::{NetError, Result};
use wharf_protocol::wire::{ControlFrame, OpaqueCandidate, OpaqueSdp, LOW_WATERMARK};

/// Which side of the exchange a connection plays. Fixes the SDP type used
/// for the local description (`offer` vs `answer`) and expected of the
/// remote one, since a connection is torn down and rebuilt rather than
/// ever switching roles mid-life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Offerer,
    Answerer,
}

fn default_configuration() -> RtcConfiguration {
    let config = RtcConfiguration::new();
    let stun = RtcIceServer::new();
    stun.set_urls(&JsValue::from_str("stun:stun.l.google.com:19302"));
    let servers = js_sys::Array::new();
    servers.push(&stun);
    config.set_ice_servers(&servers);
    config
}

/// Data-channel half of the binding. Queues inbound frames behind a
/// `tokio::sync::mpsc` channel fed by the `onmessage` callback, and exposes
/// backpressure through `bufferedamountlow`.
pub struct WebRtcDataChannel {
    handle: Rc<RefCell<Option<RtcDataChannel>>>,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<Frame>>,
    low_watermark: Rc<Notify>,
    // Keeping these alive is what keeps the callbacks registered; dropped
    // together with the channel.
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onbufferedamountlow: Closure<dyn FnMut()>,
}

impl WebRtcDataChannel {
    fn bind(handle: Rc<RefCell<Option<RtcDataChannel>>>, raw: &RtcDataChannel) -> Self {
        raw.set_binary_type(web_sys::RtcDataChannelType::Arraybuffer);
        raw.set_buffered_amount_low_threshold(LOW_WATERMARK as u32);

        let (tx, rx) = mpsc::unbounded_channel();
        let onmessage = Closure::wrap(Box::new(move |event: MessageEvent| {
            let data = event.data();
            if let Some(text) = data.as_string() {
                match serde_json::from_str::<ControlFrame>(&text) {
                    Ok(control) => {
                        let _ = tx.send(Frame::Control(control));
                    }
                    Err(e) => {
                        web_sys::console::warn_1(
                            &format!("dropping malformed control frame: {e}").into(),
                        );
                    }
                }
            } else if let Ok(buf) = data.dyn_into::<js_sys::ArrayBuffer>() {
                let bytes = Uint8Array::new(&buf).to_vec();
                let _ = tx.send(Frame::Data(bytes));
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        raw.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

        let low_watermark = Rc::new(Notify::new());
        let notify = low_watermark.clone();
        let onbufferedamountlow = Closure::wrap(Box::new(move || {
            notify.notify_waiters();
        }) as Box<dyn FnMut()>);
        raw.set_onbufferedamountlow(Some(onbufferedamountlow.as_ref().unchecked_ref()));

        Self {
            handle,
            inbox: AsyncMutex::new(rx),
            low_watermark,
            _onmessage: onmessage,
            _onbufferedamountlow: onbufferedamountlow,
        }
    }
}

impl DataChannel for WebRtcDataChannel {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let handle = self.handle.borrow();
        let channel = handle.as_ref().ok_or(NetError::ChannelClosed)?;
        if channel.ready_state() != RtcDataChannelState::Open {
            return Err(NetError::ChannelClosed);
        }
        let result = match frame {
            Frame::Control(control) => {
                let json = serde_json::to_string(&control)
                    .map_err(|e| NetError::IceCandidate(e.to_string()))?;
                channel.send_with_str(&json)
            }
            Frame::Data(bytes) => channel.send_with_u8_array(&bytes),
        };
        result.map_err(|e| NetError::IceCandidate(format!("{e:?}")))
    }

    async fn recv(&mut self) -> Option<Frame> {
        self.inbox.lock().await.recv().await
    }

    fn buffered_amount(&self) -> usize {
        self.handle
            .borrow()
            .as_ref()
            .map(|c| c.buffered_amount() as usize)
            .unwrap_or(0)
    }

    async fn wait_for_low_watermark(&mut self) {
        while self.buffered_amount() > LOW_WATERMARK {
            self.low_watermark.notified().await;
        }
    }
}

/// Placeholder data channel for an answerer connection whose remote
/// `RtcDataChannel` has not arrived yet. `send`/`recv` simply stall until
/// [`WebRtcConnection`] swaps in the real channel from the `datachannel`
/// event.
struct PendingDataChannel;

impl DataChannel for PendingDataChannel {
    async fn send(&mut self, _frame: Frame) -> Result<()> {
        Err(NetError::ChannelClosed)
    }
    async fn recv(&mut self) -> Option<Frame> {
        std::future::pending().await
    }
    fn buffered_amount(&self) -> usize {
        0
    }
    async fn wait_for_low_watermark(&mut self) {}
}

/// Browser `RtcPeerConnection`-backed [`PeerConnection`].
pub struct WebRtcConnection {
    role: ConnectionRole,
    inner: RtcPeerConnection,
    local_candidates: Rc<RefCell<VecDeque<OpaqueCandidate>>>,
    channel: Box<dyn DataChannel>,
    _onicecandidate: Closure<dyn FnMut(RtcPeerConnectionIceEvent)>,
    _ondatachannel: Option<Closure<dyn FnMut(RtcDataChannelEvent)>>,
}

impl WebRtcConnection {
    /// Build a fresh connection for `role`. The offerer opens the `file`
    /// data channel immediately; the answerer waits for it to arrive via
    /// the `datachannel` event once the offer's remote description lands.
    pub fn new(role: ConnectionRole) -> std::result::Result<Self, JsValue> {
        let inner = RtcPeerConnection::new_with_configuration(&default_configuration())?;

        let local_candidates: Rc<RefCell<VecDeque<OpaqueCandidate>>> = Rc::new(RefCell::new(VecDeque::new()));
        let candidates_for_closure = local_candidates.clone();
        let onicecandidate = Closure::wrap(Box::new(move |event: RtcPeerConnectionIceEvent| {
            if let Some(candidate) = event.candidate() {
                candidates_for_closure.borrow_mut().push_back(candidate.candidate());
            }
        }) as Box<dyn FnMut(RtcPeerConnectionIceEvent)>);
        inner.set_onicecandidate(Some(onicecandidate.as_ref().unchecked_ref()));

        let channel_handle: Rc<RefCell<Option<RtcDataChannel>>> = Rc::new(RefCell::new(None));

        let (channel, ondatachannel): (Box<dyn DataChannel>, _) = match role {
            ConnectionRole::Offerer => {
                let init = RtcDataChannelInit::new();
                init.set_ordered(true);
                let raw = inner.create_data_channel_with_data_channel_dict("file", &init);
                let bound = WebRtcDataChannel::bind(channel_handle.clone(), &raw);
                *channel_handle.borrow_mut() = Some(raw);
                (Box::new(bound), None)
            }
            ConnectionRole::Answerer => {
                let handle_for_closure = channel_handle.clone();
                let slot: Rc<RefCell<Option<WebRtcDataChannel>>> = Rc::new(RefCell::new(None));
                let slot_for_closure = slot.clone();
                let closure = Closure::wrap(Box::new(move |event: RtcDataChannelEvent| {
                    let raw = event.channel();
                    let bound = WebRtcDataChannel::bind(handle_for_closure.clone(), &raw);
                    *handle_for_closure.borrow_mut() = Some(raw);
                    *slot_for_closure.borrow_mut() = Some(bound);
                }) as Box<dyn FnMut(RtcDataChannelEvent)>);
                inner.set_ondatachannel(Some(closure.as_ref().unchecked_ref()));
                (Box::new(PendingDataChannelProxy { slot }), Some(closure))
            }
        };

        Ok(Self {
            role,
            inner,
            local_candidates,
            channel,
            _onicecandidate: onicecandidate,
            _ondatachannel: ondatachannel,
        })
    }

    fn local_sdp_type(&self) -> RtcSdpType {
        match self.role {
            ConnectionRole::Offerer => RtcSdpType::Offer,
            ConnectionRole::Answerer => RtcSdpType::Answer,
        }
    }

    fn remote_sdp_type(&self) -> RtcSdpType {
        match self.role {
            ConnectionRole::Offerer => RtcSdpType::Answer,
            ConnectionRole::Answerer => RtcSdpType::Offer,
        }
    }
}

/// Swaps itself for the real `WebRtcDataChannel` once the answerer's
/// `datachannel` event has fired; stalls `send`/`recv` until then.
struct PendingDataChannelProxy {
    slot: Rc<RefCell<Option<WebRtcDataChannel>>>,
}

impl DataChannel for PendingDataChannelProxy {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        if let Some(bound) = self.slot.borrow_mut().as_mut() {
            return bound.send(frame).await;
        }
        Err(NetError::ChannelClosed)
    }

    async fn recv(&mut self) -> Option<Frame> {
        loop {
            let has_channel = self.slot.borrow().is_some();
            if has_channel {
                let mut guard = self.slot.borrow_mut();
                return guard.as_mut().unwrap().recv().await;
            }
            yield_to_microtask().await;
        }
    }

    fn buffered_amount(&self) -> usize {
        self.slot.borrow().as_ref().map(|c| c.buffered_amount()).unwrap_or(0)
    }

    async fn wait_for_low_watermark(&mut self) {
        if let Some(bound) = self.slot.borrow_mut().as_mut() {
            bound.wait_for_low_watermark().await;
        }
    }
}

/// Yields one microtask; used while polling for the answerer's
/// `datachannel` event to arrive since there is no channel to await yet.
async fn yield_to_microtask() {
    let promise = js_sys::Promise::resolve(&JsValue::undefined());
    let _ = JsFuture::from(promise).await;
}

impl PeerConnection for WebRtcConnection {
    async fn create_offer(&mut self) -> OpaqueSdp {
        let promise = self.inner.create_offer();
        let desc = JsFuture::from(promise).await.expect("createOffer");
        extract_sdp(&desc)
    }

    async fn create_answer(&mut self) -> OpaqueSdp {
        let promise = self.inner.create_answer();
        let desc = JsFuture::from(promise).await.expect("createAnswer");
        extract_sdp(&desc)
    }

    async fn set_local_description(&mut self, sdp: &OpaqueSdp) {
        let init = RtcSessionDescriptionInit::new(self.local_sdp_type());
        init.set_sdp(sdp);
        let _ = JsFuture::from(self.inner.set_local_description(&init)).await;
    }

    async fn set_remote_description(&mut self, sdp: &OpaqueSdp) -> Result<()> {
        let init = RtcSessionDescriptionInit::new(self.remote_sdp_type());
        init.set_sdp(sdp);
        JsFuture::from(self.inner.set_remote_description(&init))
            .await
            .map_err(|e| NetError::RemoteDescription(format!("{e:?}")))?;
        Ok(())
    }

    async fn add_ice_candidate(&mut self, candidate: &OpaqueCandidate) -> Result<()> {
        let init = RtcIceCandidateInit::new(candidate);
        JsFuture::from(
            self.inner
                .add_ice_candidate_with_opt_rtc_ice_candidate_init(Some(&init)),
        )
        .await
        .map_err(|e| NetError::IceCandidate(format!("{e:?}")))?;
        Ok(())
    }

    fn poll_local_candidate(&mut self) -> Option<OpaqueCandidate> {
        self.local_candidates.borrow_mut().pop_front()
    }

    fn data_channel(&mut self) -> &mut dyn DataChannel {
        self.channel.as_mut()
    }
}

fn extract_sdp(desc: &JsValue) -> OpaqueSdp {
    js_sys::Reflect::get(desc, &JsValue::from_str("sdp"))
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_default()
}
