//! HTTP and WebSocket surface: room creation, room config lookup, and the
//! signalling upgrade itself.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use wharf_protocol::room::{generate_room_id, is_valid_room_id, RoomConfig};
use wharf_protocol::wire::{ClientFrame, ServerFrame};

use crate::rate_limit::RateLimiter;
use crate::room::{CommandSender, JoinReply, RoomCommand, RoomRegistry};
use crate::store::InMemoryConfigStore;

/// Shared server state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry<InMemoryConfigStore>>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(registry: Arc<RoomRegistry<InMemoryConfigStore>>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self { registry, rate_limiter }
    }
}

/// Build the full relay router: room admission, config lookup, signalling
/// upgrade, and a liveness probe.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/r/{room_id}", get(room_config))
        .route("/ws/{room_id}", get(ws_upgrade).fallback(unsupported_method))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Any verb other than `GET` on the signalling route is not part of the
/// upgrade dance.
async fn unsupported_method() -> StatusCode {
    StatusCode::BAD_REQUEST
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomRequest {
    max_concurrent: Option<u32>,
    creator_cid: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomResponse {
    room_id: String,
}

async fn create_room(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Option<Json<CreateRoomRequest>>,
) -> Response {
    if !state.rate_limiter.check(addr.ip()) {
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }

    let Json(request) = body.unwrap_or(Json(CreateRoomRequest {
        max_concurrent: None,
        creator_cid: None,
    }));
    let config = RoomConfig::new(request.max_concurrent, request.creator_cid);

    let room_id = generate_room_id();
    state.registry.store().save(&room_id, config).await;

    Json(CreateRoomResponse { room_id }).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomConfigResponse {
    max_concurrent: u32,
    has_creator_pin: bool,
}

async fn room_config(State(state): State<AppState>, Path(room_id): Path<String>) -> Response {
    if !is_valid_room_id(&room_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let config = state.registry.store().load(&room_id).await.unwrap_or_default();
    Json(RoomConfigResponse {
        max_concurrent: config.max_concurrent,
        has_creator_pin: config.has_creator_pin(),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
struct WsParams {
    cid: Option<String>,
}

async fn ws_upgrade(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !is_valid_room_id(&room_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let has_upgrade = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    if !has_upgrade {
        return StatusCode::UPGRADE_REQUIRED.into_response();
    }

    let tx = state.registry.get_or_spawn(&room_id);
    ws.on_upgrade(move |socket| handle_socket(socket, tx, params.cid))
}

/// Drives one socket for the lifetime of its room membership: joins,
/// forwards frames in both directions, and disconnects on close or
/// eviction by a reconnecting `cid`.
async fn handle_socket(socket: WebSocket, room_tx: CommandSender, cid: Option<String>) {
    let (mut sink, mut stream) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<ServerFrame>();
    let (evict_tx, mut evict_rx) = oneshot::channel::<()>();
    let (reply_tx, reply_rx) = oneshot::channel::<JoinReply>();

    if room_tx
        .send(RoomCommand::Join {
            cid,
            frame_tx,
            evict_tx,
            reply: reply_tx,
        })
        .is_err()
    {
        return;
    }

    let Ok(JoinReply { cid, generation, .. }) = reply_rx.await else {
        return;
    };
    debug!(%cid, generation, "socket joined room");

    loop {
        tokio::select! {
            biased;

            _ = &mut evict_rx => {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code: 1000,
                        reason: "replaced".into(),
                    })))
                    .await;
                break;
            }

            outgoing = frame_rx.recv() => {
                match outgoing {
                    Some(frame) => {
                        let Ok(json) = serde_json::to_string(&frame) else { continue };
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => {
                                let _ = room_tx.send(RoomCommand::ClientFrame {
                                    cid: cid.clone(),
                                    generation,
                                    frame,
                                });
                            }
                            Err(err) => warn!(%cid, %err, "dropping malformed client frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%cid, %err, "websocket error");
                        break;
                    }
                }
            }
        }
    }

    let _ = room_tx.send(RoomCommand::Disconnect { cid, generation });
}
