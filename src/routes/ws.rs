//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection id and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Session events queued by the store's broadcast hub → forward to client
//!
//! Handler functions translate a frame into one store call and return the
//! reply payload; they never push events themselves. The store publishes
//! events to subscribers while it still holds its lock, so a reply and the
//! events it caused can reach the client in either order. Clients use the
//! `from` field to drop echoes of their own actions.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. `session:create|join|rejoin` → reply with a snapshot and attach the
//!    connection to that participant (subscribe under the same lock)
//! 3. `tag:*`, `session:delete|complete` act as the attached participant
//! 4. Close → detach (participant record stays, `participant:disconnected`)
//!
//! `session:ended` carries the generation of the session that ended. Only an
//! ended frame for the attached generation detaches the connection; one for
//! a session it already left (say, replaced by its own `session:create`) is
//! dropped.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame, Status};
use crate::routes::sessions::{error_body, resolve_category};
use crate::services::session::{SessionError, SessionSnapshot};
use crate::state::AppState;

/// Outbound queue depth per connection.
const CLIENT_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// ERRORS
// =============================================================================

/// Requests the gateway rejects before they reach the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum GatewayError {
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("unknown prefix: {0}")]
    UnknownPrefix(String),
    #[error("unknown {prefix} op: {op}")]
    UnknownOp { prefix: &'static str, op: String },
    #[error("must join a session first")]
    NotAttached,
}

impl ErrorCode for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) | Self::UnknownPrefix(_) | Self::UnknownOp { .. } => "E_BAD_REQUEST",
            Self::NotAttached => "E_NOT_ATTACHED",
        }
    }
}

// =============================================================================
// CONNECTION STATE
// =============================================================================

/// The participant a connection speaks for, once attached.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attachment {
    session_id: String,
    participant_id: Uuid,
    /// Session incarnation the subscription belongs to.
    generation: u64,
}

/// Gateway-side state of one websocket connection.
#[derive(Debug)]
struct Connection {
    id: Uuid,
    attached: Option<Attachment>,
}

impl Connection {
    fn new(id: Uuid) -> Self {
        Self { id, attached: None }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();

    // Per-connection channel the broadcast hub pushes session events into.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(CLIENT_QUEUE_CAPACITY);

    let welcome = Frame::request("session:connected", Data::new()).with_data("client_id", connection_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%connection_id, "ws: client connected");

    let mut conn = Connection::new(connection_id);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mut conn, &client_tx, &text).await;
                        for frame in replies {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                let Some(frame) = route_push(&mut conn, frame) else { continue };
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    state.store.detach(connection_id);
    info!(%connection_id, "ws: client disconnected");
}

// =============================================================================
// PUSH ROUTING
// =============================================================================

/// Filter one hub frame on its way to the client. Returns `None` for a
/// `session:ended` that belongs to a session incarnation this connection
/// has already left.
fn route_push(conn: &mut Connection, frame: Frame) -> Option<Frame> {
    if frame.syscall != "session:ended" {
        return Some(frame);
    }
    let ended = frame
        .data
        .get("generation")
        .and_then(serde_json::Value::as_u64);
    match &conn.attached {
        Some(a) if Some(a.generation) == ended => {
            conn.attached = None;
            Some(frame)
        }
        Some(a) => {
            info!(connection_id = %conn.id, attached = a.generation, ?ended, "ws: dropped stale session:ended");
            None
        }
        None => Some(frame),
    }
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept apart from the socket so tests can drive the gateway end-to-end
/// with plain channels.
async fn process_inbound_text(
    state: &AppState,
    conn: &mut Connection,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(connection_id = %conn.id, error = %e, "ws: invalid inbound frame");
            let err = GatewayError::InvalidJson(e.to_string());
            return vec![Frame::request("gateway:error", error_body(&err))];
        }
    };

    // Stamp the attached participant as `from`.
    req.from = conn
        .attached
        .as_ref()
        .map(|a| a.participant_id.to_string());

    info!(connection_id = %conn.id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.prefix() {
        "session" => handle_session(state, conn, client_tx, &req).await,
        "tag" => handle_tag(state, conn, &req).await,
        prefix => Err(req.error_from(&GatewayError::UnknownPrefix(prefix.to_owned()))),
    };

    match result {
        Ok(data) => vec![req.done_with(data)],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// SESSION HANDLERS
// =============================================================================

async fn handle_session(
    state: &AppState,
    conn: &mut Connection,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Data, Frame> {
    match req.op() {
        "create" => {
            let name = required_str(req, "name")?;
            let description = req
                .data
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let created = state
                .store
                .create_session(description, name)
                .map_err(|e| req.error_from(&e))?;
            let snapshot = attach(state, conn, client_tx, &created.session_id, created.participant_id)
                .map_err(|e| req.error_from(&e))?;

            let mut data = Data::new();
            data.insert("sessionId".into(), serde_json::json!(created.session_id));
            data.insert("participantId".into(), serde_json::json!(created.participant_id));
            data.insert("participantCode".into(), serde_json::json!(created.participant_code));
            insert_snapshot(&mut data, &snapshot);
            Ok(data)
        }
        "join" => {
            let session_id = session_id_of(req)?;
            let name = required_str(req, "name")?;
            let joined = state
                .store
                .join_session(&session_id, name)
                .map_err(|e| req.error_from(&e))?;
            let snapshot = attach(state, conn, client_tx, &session_id, joined.participant_id)
                .map_err(|e| req.error_from(&e))?;

            let mut data = Data::new();
            data.insert("participantId".into(), serde_json::json!(joined.participant_id));
            data.insert("participantCode".into(), serde_json::json!(joined.participant_code));
            insert_snapshot(&mut data, &snapshot);
            Ok(data)
        }
        "rejoin" => {
            let session_id = session_id_of(req)?;
            let code = required_str(req, "code")?;
            let rejoined = state
                .store
                .rejoin_session(&session_id, code)
                .map_err(|e| req.error_from(&e))?;
            let snapshot = attach(state, conn, client_tx, &session_id, rejoined.participant_id)
                .map_err(|e| req.error_from(&e))?;

            let mut data = Data::new();
            data.insert("participantId".into(), serde_json::json!(rejoined.participant_id));
            data.insert("participantCode".into(), serde_json::json!(rejoined.participant_code));
            data.insert("name".into(), serde_json::json!(rejoined.name));
            data.insert("isCreator".into(), serde_json::json!(rejoined.is_creator));
            data.insert("isAdmin".into(), serde_json::json!(rejoined.is_admin));
            insert_snapshot(&mut data, &snapshot);
            Ok(data)
        }
        "get" => {
            let session_id = match session_id_of(req) {
                Ok(id) => id,
                Err(err_frame) => match &conn.attached {
                    Some(a) => a.session_id.clone(),
                    None => return Err(err_frame),
                },
            };
            let snapshot = state
                .store
                .get_session(&session_id)
                .map_err(|e| req.error_from(&e))?;
            let mut data = Data::new();
            insert_snapshot(&mut data, &snapshot);
            Ok(data)
        }
        "delete" => {
            let attached = require_attached(conn, req)?;
            state
                .store
                .delete_session(&attached.session_id, attached.participant_id)
                .map_err(|e| req.error_from(&e))?;
            conn.attached = None;
            Ok(Data::new())
        }
        "complete" => {
            let attached = require_attached(conn, req)?;
            let snapshot = state
                .store
                .complete_session(&attached.session_id, attached.participant_id)
                .map_err(|e| req.error_from(&e))?;
            let mut data = Data::new();
            insert_snapshot(&mut data, &snapshot);
            Ok(data)
        }
        op => Err(req.error_from(&GatewayError::UnknownOp { prefix: "session", op: op.to_owned() })),
    }
}

// =============================================================================
// TAG HANDLERS
// =============================================================================

async fn handle_tag(state: &AppState, conn: &Connection, req: &Frame) -> Result<Data, Frame> {
    match req.op() {
        "add" => {
            let attached = require_attached(conn, req)?;
            let text = required_str(req, "text")?;
            let category = req.data.get("category").and_then(|v| v.as_str());
            let category = resolve_category(state, text, category)
                .await
                .map_err(|e| req.error_from(&e))?;
            let added = state
                .store
                .add_tag(&attached.session_id, attached.participant_id, text, category)
                .map_err(|e| req.error_from(&e))?;

            let mut data = Data::new();
            data.insert("tag".into(), serde_json::to_value(&added.tag).unwrap_or_default());
            data.insert("wasNewlyCreated".into(), serde_json::json!(added.was_newly_created));
            Ok(data)
        }
        "vote" => {
            let attached = require_attached(conn, req)?;
            let Some(tag_id) = req
                .data
                .get("tagId")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<Uuid>().ok())
            else {
                return Err(req.error_from(&missing("tagId")));
            };
            let Some(value) = req.data.get("value").and_then(serde_json::Value::as_i64) else {
                return Err(req.error_from(&missing("value")));
            };
            let outcome = state
                .store
                .vote(&attached.session_id, attached.participant_id, tag_id, value)
                .map_err(|e| req.error_from(&e))?;

            let mut data = Data::new();
            data.insert("tagId".into(), serde_json::json!(outcome.tag_id));
            data.insert("totalScore".into(), serde_json::json!(outcome.total_score));
            data.insert("votes".into(), serde_json::to_value(&outcome.votes).unwrap_or_default());
            Ok(data)
        }
        "classify" => {
            let text = required_str(req, "text")?;
            let category = state
                .classifier
                .classify(text)
                .await
                .map_err(|e| req.error_from(&e))?;
            let mut data = Data::new();
            data.insert("category".into(), serde_json::json!(category));
            Ok(data)
        }
        op => Err(req.error_from(&GatewayError::UnknownOp { prefix: "tag", op: op.to_owned() })),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Attach this connection to a participant, detaching any previous one.
fn attach(
    state: &AppState,
    conn: &mut Connection,
    client_tx: &mpsc::Sender<Frame>,
    session_id: &str,
    participant_id: Uuid,
) -> Result<SessionSnapshot, SessionError> {
    let attached = state
        .store
        .attach(session_id, participant_id, conn.id, client_tx.clone())?;
    conn.attached = Some(Attachment {
        session_id: session_id.to_owned(),
        participant_id,
        generation: attached.generation,
    });
    Ok(attached.snapshot)
}

fn require_attached(conn: &Connection, req: &Frame) -> Result<Attachment, Frame> {
    conn.attached
        .clone()
        .ok_or_else(|| req.error_from(&GatewayError::NotAttached))
}

fn missing(field: &'static str) -> SessionError {
    SessionError::Validation { field, message: format!("{field} required"), suggestion: None }
}

fn required_str<'a>(req: &'a Frame, key: &'static str) -> Result<&'a str, Frame> {
    req.data
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| req.error_from(&missing(key)))
}

/// `sessionId` from the payload, falling back to the envelope.
fn session_id_of(req: &Frame) -> Result<String, Frame> {
    req.data
        .get("sessionId")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| req.session_id.clone())
        .ok_or_else(|| req.error_from(&missing("sessionId")))
}

fn insert_snapshot(data: &mut Data, snapshot: &SessionSnapshot) {
    data.insert("session".into(), serde_json::to_value(snapshot).unwrap_or_default());
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
