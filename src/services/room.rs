//! Room service: registry, join/leave, command dispatch, and fan-out.
//!
//! DESIGN
//! ======
//! The registry is a `RwLock<HashMap<RoomCode, RoomHandle>>`. Rooms are
//! created lazily under the write lock with the entry API, so two racing
//! first joins to the same code get the same room. The registry lock is
//! always released before a room lock is taken.
//!
//! Each room is a `Mutex<Room>`. Every operation here takes that lock once
//! and holds it across apply → snapshot → fan-out, which makes command
//! handling linearizable per room: a late answer either lands before the
//! reveal and counts, or lands after and is rejected for the phase.
//!
//! Fan-out pushes into each connection's bounded channel with `try_send`
//! while the lock is held. Every recipient therefore sees snapshots in
//! version order; a recipient with a full buffer misses that snapshot and
//! catches up on the next one.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use crate::frame::{ErrorCode, Event, JoinSuccess, Notice};
use crate::services::command::{Command, CommandError, Effect, JoinRequest, apply};
use crate::services::snapshot::{RoomSnapshot, snapshot};
use crate::state::{AppState, ConnectionId, Room, RoomCode, RoomHandle};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room not found: {0}")]
    NotFound(RoomCode),
    #[error("room {0} has been closed")]
    Closed(RoomCode),
    #[error("room code required")]
    MissingRoomCode,
    #[error("room code {requested} does not match this connection's room {bound}")]
    CodeMismatch { bound: RoomCode, requested: RoomCode },
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ROOM_NOT_FOUND",
            Self::Closed(_) => "E_ROOM_CLOSED",
            Self::MissingRoomCode => "E_MISSING_ROOM_CODE",
            Self::CodeMismatch { .. } => "E_ROOM_CODE_MISMATCH",
            Self::Command(e) => e.error_code(),
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Return the room for `code`, creating it in the lobby phase if absent.
pub async fn get_or_create(state: &AppState, code: &RoomCode) -> RoomHandle {
    {
        let rooms = state.rooms.read().await;
        if let Some(handle) = rooms.get(code) {
            return handle.clone();
        }
    }

    let mut rooms = state.rooms.write().await;
    rooms
        .entry(code.clone())
        .or_insert_with(|| {
            info!(room_code = %code, "room created");
            Arc::new(Mutex::new(Room::new(code.clone(), state.questions.clone())))
        })
        .clone()
}

/// Look up an existing room.
///
/// # Errors
///
/// Returns `NotFound` if no room is registered under `code`.
pub async fn get(state: &AppState, code: &RoomCode) -> Result<RoomHandle, RoomError> {
    let rooms = state.rooms.read().await;
    rooms
        .get(code)
        .cloned()
        .ok_or_else(|| RoomError::NotFound(code.clone()))
}

/// Allocate a random code that is not in use and register an empty room.
pub async fn create_with_fresh_code(state: &AppState) -> (RoomCode, RoomHandle) {
    let mut rooms = state.rooms.write().await;
    loop {
        let code = RoomCode::random();
        if rooms.contains_key(&code) {
            continue;
        }
        let handle = Arc::new(Mutex::new(Room::new(code.clone(), state.questions.clone())));
        rooms.insert(code.clone(), handle.clone());
        info!(room_code = %code, "room allocated");
        return (code, handle);
    }
}

/// Unregister `code`, but only if it still maps to `handle`.
pub async fn remove(state: &AppState, code: &RoomCode, handle: &RoomHandle) {
    let mut rooms = state.rooms.write().await;
    if rooms.get(code).is_some_and(|current| Arc::ptr_eq(current, handle)) {
        rooms.remove(code);
        info!(room_code = %code, "room removed");
    }
}

/// Pick the room a join targets: the code the socket was opened on, the
/// code in the payload, or both when they agree.
///
/// # Errors
///
/// `MissingRoomCode` when neither is given, `CodeMismatch` when they differ.
pub fn resolve_code(bound: Option<&RoomCode>, requested: Option<&RoomCode>) -> Result<RoomCode, RoomError> {
    match (bound, requested) {
        (Some(b), Some(r)) if b != r => Err(RoomError::CodeMismatch { bound: b.clone(), requested: r.clone() }),
        (Some(code), _) | (None, Some(code)) => Ok(code.clone()),
        (None, None) => Err(RoomError::MissingRoomCode),
    }
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// Join `code` as `connection_id`, attaching `tx` for outbound events.
/// Sends `join-success` to the joiner, then a snapshot to the whole room.
///
/// # Errors
///
/// Returns the processor's rejection (e.g. locked room).
pub async fn join(
    state: &AppState,
    code: &RoomCode,
    connection_id: ConnectionId,
    tx: mpsc::Sender<Event>,
    req: JoinRequest,
) -> Result<RoomHandle, RoomError> {
    let command = Command::Join(req);
    loop {
        let handle = get_or_create(state, code).await;
        let mut guard = handle.lock().await;
        let room = &mut *guard;

        if room.closed {
            // Closed but not yet unregistered; drop it and start fresh.
            drop(guard);
            remove(state, code, &handle).await;
            continue;
        }

        let effect = apply(&mut room.state, connection_id, &command)?;
        let is_admin = room
            .state
            .player(connection_id)
            .is_some_and(|p| p.is_host);

        room.clients.insert(connection_id, tx.clone());
        if tx
            .try_send(Event::JoinSuccess(JoinSuccess { player_id: connection_id, is_admin }))
            .is_err()
        {
            warn!(room_code = %code, %connection_id, "join-success dropped");
        }

        info!(
            room_code = %code,
            %connection_id,
            is_admin,
            players = room.state.players.len(),
            "player joined room"
        );
        publish(room, effect);
        drop(guard);
        return Ok(handle);
    }
}

/// Detach a closed transport and remove its player.
pub async fn disconnect(handle: &RoomHandle, connection_id: ConnectionId) {
    let mut guard = handle.lock().await;
    let room = &mut *guard;
    room.clients.remove(&connection_id);
    if room.closed {
        return;
    }
    match apply(&mut room.state, connection_id, &Command::Disconnect) {
        Ok(effect) => {
            info!(room_code = %room.state.room_code, %connection_id, "player disconnected");
            publish(room, effect);
        }
        Err(e) => warn!(room_code = %room.state.room_code, %connection_id, error = %e, "disconnect rejected"),
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Apply one command from an attached connection and publish the result.
///
/// # Errors
///
/// Returns the rejection for the sender; the room is untouched.
pub async fn dispatch(
    state: &AppState,
    handle: &RoomHandle,
    connection_id: ConnectionId,
    command: &Command,
) -> Result<(), RoomError> {
    let mut guard = handle.lock().await;
    let room = &mut *guard;
    let code = room.state.room_code.clone();

    if room.closed {
        return Err(RoomError::Closed(code));
    }

    let effect = apply(&mut room.state, connection_id, command)?;
    if matches!(command, Command::LeaveGame) {
        room.clients.remove(&connection_id);
    }
    if effect != Effect::Unchanged {
        info!(
            room_code = %code,
            %connection_id,
            command = command.name(),
            phase = %room.state.phase,
            answered = room.state.answers.len(),
            answering = room.state.non_host_count(),
            "command applied"
        );
    }
    publish(room, effect);
    drop(guard);

    if effect == Effect::Closed {
        remove(state, &code, handle).await;
    }
    Ok(())
}

/// Whether `connection_id` still has an outbound channel in the room.
pub async fn is_attached(handle: &RoomHandle, connection_id: ConnectionId) -> bool {
    handle.lock().await.clients.contains_key(&connection_id)
}

/// Current snapshot of a room without changing it.
pub async fn current_snapshot(handle: &RoomHandle) -> RoomSnapshot {
    let room = handle.lock().await;
    snapshot(&room.state, room.version)
}

// =============================================================================
// FAN-OUT
// =============================================================================

/// Turn an effect into outbound events. Caller holds the room lock.
fn publish(room: &mut Room, effect: Effect) {
    match effect {
        Effect::Unchanged => {}
        Effect::Updated => broadcast_snapshot(room),
        Effect::Started => {
            broadcast_snapshot(room);
            broadcast(room, &Event::QuizStarted);
        }
        Effect::Ended => {
            broadcast_snapshot(room);
            broadcast(room, &Event::QuizEnded);
        }
        Effect::Kicked(target) => {
            if let Some(tx) = room.clients.remove(&target) {
                let _ = tx.try_send(Event::Kicked(Notice { message: "removed from the room by the host".into() }));
            }
            broadcast_snapshot(room);
        }
        Effect::Closed => {
            room.closed = true;
            broadcast(room, &Event::GameClosed(Notice { message: "the host closed the game".into() }));
            room.clients.clear();
        }
    }
}

fn broadcast_snapshot(room: &mut Room) {
    room.version += 1;
    let event = Event::GameStateUpdate(snapshot(&room.state, room.version));
    broadcast(room, &event);
}

/// Best-effort send to every attached connection.
fn broadcast(room: &Room, event: &Event) {
    for (connection_id, tx) in &room.clients {
        if tx.try_send(event.clone()).is_err() {
            warn!(
                room_code = %room.state.room_code,
                %connection_id,
                event = event.kind(),
                "client channel full or closed; event dropped"
            );
        }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
