//! WebSocket handler: one quiz session per connection.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection ID (which doubles as the player ID)
//! and enters a `select!` loop:
//! - Incoming client frames → decode into a `Command` → room service
//! - Events fanned out by the connection's room → forward to client
//!
//! The room service pushes every room-wide event (including the sender's
//! own copy of a snapshot) into the connection channel. The only frames
//! written directly from this module are errors for the sender.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade on `/ws/{room_code}` (code bound) or `/ws` (code per join)
//! 2. `join-game` attaches the connection to a room
//! 3. Further commands are dispatched to that room
//! 4. `kicked` / `game-closed` / `leave-game` detach it again
//! 5. Close → synthesized disconnect → cleanup

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Event, decode_command};
use crate::services::command::{Command, CommandError, JoinRequest};
use crate::services::room::{self, RoomError};
use crate::state::{AppState, ConnectionId, RoomCode, RoomHandle};

// =============================================================================
// UPGRADE
// =============================================================================

/// `GET /ws`: session without a bound room; joins must name one.
pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, None))
}

/// `GET /ws/:room_code`: session bound to one room code.
pub async fn handle_room_ws(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(code) = RoomCode::parse(&room_code) else {
        return (StatusCode::BAD_REQUEST, "invalid room code").into_response();
    };
    ws.on_upgrade(move |socket| run_ws(socket, state, Some(code)))
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Per-socket session state.
struct Connection {
    id: ConnectionId,
    /// Code from the upgrade path, if any.
    bound_code: Option<RoomCode>,
    /// Room this connection is attached to.
    current: Option<(RoomCode, RoomHandle)>,
    /// Sender half handed to every room this connection joins.
    tx: mpsc::Sender<Event>,
}

impl Connection {
    fn new(bound_code: Option<RoomCode>, tx: mpsc::Sender<Event>) -> Self {
        Self { id: Uuid::new_v4(), bound_code, current: None, tx }
    }

    /// Forget the current room if it no longer holds our channel.
    async fn release_if_detached(&mut self) {
        if let Some((code, handle)) = &self.current {
            if !room::is_attached(handle, self.id).await {
                info!(connection_id = %self.id, room_code = %code, "ws: detached from room");
                self.current = None;
            }
        }
    }
}

async fn run_ws(mut socket: WebSocket, state: AppState, bound_code: Option<RoomCode>) {
    let (client_tx, mut client_rx) = mpsc::channel::<Event>(state.config.client_channel_capacity);
    let mut conn = Connection::new(bound_code, client_tx);

    info!(connection_id = %conn.id, bound_code = ?conn.bound_code.as_ref().map(RoomCode::as_str), "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mut conn, &text).await;
                        for event in replies {
                            let _ = send_event(&mut socket, conn.id, &event).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, conn.id, &event).await.is_err() {
                    break;
                }
                if event.detaches() {
                    conn.release_if_detached().await;
                }
            }
        }
    }

    if let Some((_, handle)) = conn.current.take() {
        room::disconnect(&handle, conn.id).await;
    }
    info!(connection_id = %conn.id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode and process one inbound text frame and return events for the
/// sender alone. Room-wide events travel through the connection channel.
async fn process_inbound_text(state: &AppState, conn: &mut Connection, text: &str) -> Vec<Event> {
    let command = match decode_command(text) {
        Ok(command) => command,
        Err(e) => {
            warn!(connection_id = %conn.id, error = %e, "ws: invalid inbound frame");
            return vec![Event::error_from(&e)];
        }
    };

    info!(connection_id = %conn.id, command = command.name(), "ws: recv frame");

    let result = match command {
        Command::Join(req) => handle_join(state, conn, req).await,
        other => handle_room_command(state, conn, &other).await,
    };

    match result {
        Ok(()) => vec![],
        Err(e) => vec![Event::error_from(&e)],
    }
}

async fn handle_join(state: &AppState, conn: &mut Connection, req: JoinRequest) -> Result<(), RoomError> {
    let code = room::resolve_code(conn.bound_code.as_ref(), req.room_code.as_ref())?;

    // Switching rooms on the unbound endpoint leaves the old room first.
    if let Some((current_code, handle)) = &conn.current {
        if *current_code != code {
            room::disconnect(handle, conn.id).await;
            conn.current = None;
        }
    }

    let handle = room::join(state, &code, conn.id, conn.tx.clone(), req).await?;
    conn.current = Some((code, handle));
    Ok(())
}

async fn handle_room_command(state: &AppState, conn: &mut Connection, command: &Command) -> Result<(), RoomError> {
    let Some((_, handle)) = &conn.current else {
        return Err(CommandError::NotJoined.into());
    };
    let result = room::dispatch(state, handle, conn.id, command).await;
    if matches!(command, Command::LeaveGame) {
        conn.current = None;
    }
    result
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, connection_id: ConnectionId, event: &Event) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    match event {
        Event::Error(err) => {
            warn!(%connection_id, code = %err.code, message = %err.message, "ws: send event type=error");
        }
        Event::GameStateUpdate(snap) => {
            info!(%connection_id, room_code = %snap.room_code, version = snap.version, "ws: send snapshot");
        }
        _ => info!(%connection_id, event = event.kind(), "ws: send event"),
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
