//! WebSocket handler — the chat session gateway.
//!
//! DESIGN
//! ======
//! On upgrade, the connection's identity is resolved once, from a one-time
//! `?ticket=` or the session cookie, and the connection enters a `select!`
//! loop:
//! - Incoming client frames → parse + dispatch by intent `type`
//! - Hub events → forward to client
//!
//! Intent handlers return an `Outcome` for the requester only. Broadcasts
//! never happen here: the chat room publishes every committed change to the
//! hub, and the sender receives its own event through the hub like everyone
//! else.
//!
//! LIFECYCLE
//! =========
//! `Unauthenticated → Authenticated → Closed`, decided at connect time.
//! 1. Upgrade → register with the hub (authenticated only) → send
//!    `session:connected`
//! 2. Client sends intents → dispatch → Outcome → reply to sender
//! 3. Disconnect or `logout` → `Closed` → unregister. Nothing is processed
//!    after `Closed`; commits already started still finish and broadcast.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::user_from_jar;
use crate::frame::{Data, FRAME_CODE, FRAME_CONTENT, FRAME_MESSAGE, FRAME_MESSAGE_ID, Frame, Status};
use crate::services::chat::ChatError;
use crate::services::message::StoreError;
use crate::services::session::{self, ChatUser};
use crate::services::moderation;
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

/// Per-connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Unauthenticated,
    Authenticated(ChatUser),
    Closed,
}

impl ConnectionState {
    fn user(&self) -> Option<&ChatUser> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Unauthenticated | Self::Closed => None,
        }
    }
}

/// Result returned by intent handlers. The dispatch layer turns it into the
/// requester's reply; handlers never send frames directly.
enum Outcome {
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
    /// Send empty done, then close the connection.
    Close,
}

#[derive(Deserialize)]
pub struct WsQuery {
    pub ticket: Option<String>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
    jar: CookieJar,
    ws: WebSocketUpgrade,
) -> Response {
    let resolved = match params.ticket.as_deref() {
        Some(ticket) => session::consume_ws_ticket(&state.pool, ticket).await,
        None => user_from_jar(&state, &jar).await,
    };

    let user = match resolved {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, "ws identity lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "identity lookup error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user: Option<ChatUser>) {
    let client_id = Uuid::new_v4();
    let hub = state.room.hub().clone();

    // Per-connection channel for receiving hub events.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_queue_capacity);

    let mut welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("authenticated", user.is_some());
    if let Some(user) = &user {
        welcome = welcome
            .with_data("user_id", user.id)
            .with_data("username", user.name.clone());
        hub.register(client_id, user.id, client_tx.clone()).await;
    }

    let mut conn = user.map_or(ConnectionState::Unauthenticated, ConnectionState::Authenticated);
    let connections = hub.connection_count().await;
    info!(%client_id, authenticated = conn.user().is_some(), connections, "ws: client connected");

    if send_frame(&mut socket, &welcome).await.is_ok() {
        loop {
            tokio::select! {
                msg = socket.recv() => {
                    let Some(Ok(msg)) = msg else { break };
                    match msg {
                        Message::Text(text) => {
                            for frame in process_inbound_text(&state, &mut conn, client_id, &text).await {
                                let _ = send_frame(&mut socket, &frame).await;
                            }
                            if conn == ConnectionState::Closed {
                                let _ = socket.send(Message::Close(None)).await;
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                Some(frame) = client_rx.recv() => {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    hub.unregister(client_id).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept apart from the socket so tests can drive intent handling directly.
pub(crate) async fn process_inbound_text(
    state: &AppState,
    conn: &mut ConnectionState,
    client_id: Uuid,
    text: &str,
) -> Vec<Frame> {
    if *conn == ConnectionState::Closed {
        return vec![];
    }

    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data(FRAME_MESSAGE, format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the authenticated user id as `from`; never trust the client's.
    req.from = conn.user().map(|u| u.id.to_string());
    info!(%client_id, id = %req.id, kind = %req.kind, "ws: recv frame");

    let result = match (req.kind.as_str(), conn.user()) {
        ("list", _) => handle_list(state, &req).await,
        (_, None) => Err(req.error_from(&ChatError::Unauthenticated)),
        ("send", Some(user)) => handle_send(state, user, &req).await,
        ("edit", Some(user)) => handle_edit(state, user, &req).await,
        ("delete", Some(user)) => handle_delete(state, user, &req).await,
        ("clear", Some(user)) => handle_clear(state, user, &req).await,
        ("logout", Some(_)) => Ok(Outcome::Close),
        (kind, Some(_)) => Err(req.error(format!("unknown intent: {kind}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Ok(Outcome::Close) => {
            info!(%client_id, "ws: logout");
            *conn = ConnectionState::Closed;
            vec![req.done()]
        }
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// INTENT HANDLERS
// =============================================================================

fn message_id_reply(message_id: i64) -> Data {
    let mut data = Data::new();
    data.insert(FRAME_MESSAGE_ID.into(), serde_json::json!(message_id));
    data
}

async fn handle_list(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    let messages = state.room.list_active().await.map_err(|e| req.error_from(&e))?;
    let value = serde_json::to_value(&messages).map_err(|e| req.error(format!("serialize failed: {e}")))?;
    let mut data = Data::new();
    data.insert("messages".into(), value);
    Ok(Outcome::Reply(data))
}

async fn handle_send(state: &AppState, user: &ChatUser, req: &Frame) -> Result<Outcome, Frame> {
    let content = req.str_field(FRAME_CONTENT).unwrap_or_default();
    match state.room.send(user, content).await {
        Ok(message) => Ok(Outcome::Reply(message_id_reply(message.id))),
        // Blank sends have no visible effect anywhere.
        Err(ChatError::Store(StoreError::EmptyContent)) => Ok(Outcome::Done),
        Err(e) => Err(req.error_from(&e)),
    }
}

async fn handle_edit(state: &AppState, user: &ChatUser, req: &Frame) -> Result<Outcome, Frame> {
    let Some(message_id) = req.message_id() else {
        return Err(invalid(req, "message_id required"));
    };
    let Some(content) = req.str_field(FRAME_CONTENT) else {
        return Err(invalid(req, "content required"));
    };
    match state.room.edit_own(user, message_id, content).await {
        Ok(message) => Ok(Outcome::Reply(message_id_reply(message.id))),
        Err(e) => Err(req.error_from(&e)),
    }
}

async fn handle_delete(state: &AppState, user: &ChatUser, req: &Frame) -> Result<Outcome, Frame> {
    let Some(message_id) = req.message_id() else {
        return Err(invalid(req, "message_id required"));
    };
    match state.room.delete_own(user, message_id).await {
        Ok(message) => Ok(Outcome::Reply(message_id_reply(message.id))),
        Err(e) => Err(req.error_from(&e)),
    }
}

async fn handle_clear(state: &AppState, user: &ChatUser, req: &Frame) -> Result<Outcome, Frame> {
    match moderation::clear_all(&state.room, &state.authorizer, user).await {
        Ok(removed) => {
            let mut data = Data::new();
            data.insert("removed".into(), serde_json::json!(removed));
            Ok(Outcome::Reply(data))
        }
        Err(e) => Err(req.error_from(&e)),
    }
}

/// Error reply for a malformed intent payload.
fn invalid(req: &Frame, message: &str) -> Frame {
    let mut frame = req.error(message);
    frame.data.insert(FRAME_CODE.into(), serde_json::json!("E_VALIDATION"));
    frame
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.str_field(FRAME_CODE).unwrap_or("-");
        let message = frame.str_field(FRAME_MESSAGE).unwrap_or("-");
        warn!(id = %frame.id, kind = %frame.kind, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, kind = %frame.kind, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
