//! HTTP and WebSocket transport.
//!
//! The runtime side of the relay: an axum router exposing the room REST
//! endpoints, the liveness probe, and the `/ws` upgrade. Each socket task
//! translates between the wire and [`RelayDriver`] events, and executes the
//! driver's actions through a per-session outbound channel.
//!
//! The driver sits behind an async mutex. Lock scopes are kept tight and
//! never cross an await on socket IO; outbound sends go through unbounded
//! channels precisely so dispatch needs no await while the lock is held.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::{
    Json, Router,
    extract::{
        ConnectInfo, Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use futures::{SinkExt as _, StreamExt as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::{Mutex, mpsc};

use huddle_proto::{ClientFrame, MAX_MESSAGE_BYTES, RoomId, ServerFrame};

use crate::driver::{RelayAction, RelayDriver, RelayEvent};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    /// The relay state machine. Tight lock scopes only.
    driver: Arc<Mutex<RelayDriver>>,
    /// Per-session outbound channels. Dropping a sender ends its socket's
    /// writer task, which closes the socket.
    outbound: Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<ServerFrame>>>>,
    /// Monotonic session id source.
    next_session: Arc<AtomicU64>,
}

impl AppState {
    /// Wrap a driver for sharing across handlers.
    pub fn new(driver: RelayDriver) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
            outbound: Arc::new(Mutex::new(HashMap::new())),
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The driver handle, for the sweep task.
    pub fn driver(&self) -> Arc<Mutex<RelayDriver>> {
        Arc::clone(&self.driver)
    }
}

/// Build the relay router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/:room_id", get(room_exists))
        .route("/is-alive", post(is_alive))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomRequest {
    room_id: String,
}

#[derive(Debug, Serialize)]
struct ExistsResponse {
    exists: bool,
}

/// POST /api/rooms: reserve a room before its creator connects.
async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> impl IntoResponse {
    match RoomId::parse(&body.room_id) {
        Ok(room_id) => {
            state.driver.lock().await.reserve(room_id.clone(), Instant::now());
            tracing::debug!(%room_id, "room reserved");
            (StatusCode::OK, Json(json!({ "success": true })))
        },
        Err(_) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid room ID" })))
        },
    }
}

/// GET /api/rooms/:room_id: existence probe for the join screen.
///
/// A malformed id cannot name an existing room, so it answers `false`
/// rather than erroring.
async fn room_exists(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Json<ExistsResponse> {
    let exists = match RoomId::parse(&room_id) {
        Ok(room_id) => state.driver.lock().await.room_exists(&room_id),
        Err(_) => false,
    };
    Json(ExistsResponse { exists })
}

/// POST /is-alive: liveness probe.
async fn is_alive() -> Json<serde_json::Value> {
    Json(json!({ "message": "Server is alive" }))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Same ceiling as the relay's per-frame check; oversized socket frames
    // fail the read and drop the connection.
    ws.max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, addr, state))
}

async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let session_id = state.next_session.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(session_id, %addr, "connection accepted");

    let (mut writer, mut reader) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    state.outbound.lock().await.insert(session_id, tx);

    // Writer task: drains the outbound channel onto the socket. Ends when
    // the channel's last sender is dropped or the socket dies.
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(encoded) = frame.to_json() else { continue };
            if writer.send(Message::Text(encoded)).await.is_err() {
                break;
            }
        }
        let _ = writer.close().await;
    });

    let accepted = {
        let mut driver = state.driver.lock().await;
        driver.process_event(RelayEvent::ConnectionAccepted { session_id, addr: addr.ip() })
    };
    let mut close_self = dispatch(&state, session_id, accepted).await;

    while !close_self {
        let Some(msg) = reader.next().await else { break };
        match msg {
            Ok(Message::Text(text)) => {
                let actions = match ClientFrame::from_json(&text) {
                    Ok(frame) => {
                        let mut driver = state.driver.lock().await;
                        driver.process_event(RelayEvent::FrameReceived {
                            session_id,
                            frame,
                            now_ms: unix_millis(),
                        })
                    },
                    Err(e) => {
                        tracing::debug!(session_id, error = %e, "undecodable frame");
                        vec![RelayAction::Send {
                            session_id,
                            frame: ServerFrame::Error {
                                code: None,
                                message: format!("malformed frame: {e}"),
                            },
                        }]
                    },
                };
                close_self = dispatch(&state, session_id, actions).await;
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {},
        }
    }

    let closed = {
        let mut driver = state.driver.lock().await;
        driver.process_event(RelayEvent::ConnectionClosed { session_id })
    };
    dispatch(&state, session_id, closed).await;

    state.outbound.lock().await.remove(&session_id);
    writer_task.abort();
    tracing::debug!(session_id, "connection closed");
}

/// Execute driver actions on behalf of `own_session`. Returns `true` when
/// one of them closes that session.
async fn dispatch(state: &AppState, own_session: u64, actions: Vec<RelayAction>) -> bool {
    let mut close_self = false;
    let mut outbound = state.outbound.lock().await;
    for action in actions {
        match action {
            RelayAction::Send { session_id, frame } => {
                if let Some(tx) = outbound.get(&session_id) {
                    // A send to a session mid-teardown is dropped; its
                    // ConnectionClosed cleanup is already on the way.
                    let _ = tx.send(frame);
                }
            },
            RelayAction::Close { session_id } => {
                // Dropping the sender ends the writer task after it drains
                // the frames queued above (the error frame arrives first).
                outbound.remove(&session_id);
                if session_id == own_session {
                    close_self = true;
                }
            },
        }
    }
    close_self
}

/// Wall-clock milliseconds, the timestamp stamped into relayed messages.
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
