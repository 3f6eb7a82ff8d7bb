//! Frame: the session protocol spoken over every websocket.
//!
//! ARCHITECTURE
//! ============
//! Both directions use one JSON envelope: `{ "type": string, "payload"?: value }`.
//! Inbound frames are decoded exactly once, here, into the closed `Command`
//! enum; nothing downstream ever matches on a type string. Outbound traffic
//! is the closed `Event` enum, serialized with the same envelope shape.
//!
//! DESIGN
//! ======
//! - Malformed input (bad JSON, unknown type, missing fields, empty name,
//!   bad room code) is rejected here, before it reaches a room.
//! - Range checks that need room context (answer index vs. option count)
//!   belong to the command processor, not the decoder.
//! - Every client-facing error implements `ErrorCode` so it renders as a
//!   structured `error` event.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::services::command::{Command, JoinRequest};
use crate::services::snapshot::RoomSnapshot;
use crate::state::RoomCode;

/// Display names are cut to this many characters after sanitizing.
pub const MAX_NAME_CHARS: usize = 24;

/// Icon references are cut to this many characters.
pub const MAX_ICON_CHARS: usize = 64;

// =============================================================================
// ENVELOPE
// =============================================================================

/// Raw envelope as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured error events.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid frame: {0}")]
    InvalidFrame(#[source] serde_json::Error),
    #[error("unknown command type: {0}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("name must not be empty")]
    EmptyName,
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),
}

impl ErrorCode for ProtocolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidFrame(_) => "E_INVALID_FRAME",
            Self::UnknownType(_) => "E_UNKNOWN_TYPE",
            Self::InvalidPayload { .. } => "E_INVALID_PAYLOAD",
            Self::EmptyName => "E_EMPTY_NAME",
            Self::InvalidRoomCode(_) => "E_INVALID_ROOM_CODE",
        }
    }
}

// =============================================================================
// INBOUND
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinPayload {
    name: String,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    room_code: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerPayload {
    answer_index: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetPayload {
    player_id: Uuid,
    #[serde(default = "default_true")]
    muted: bool,
}

#[derive(Deserialize)]
struct LockPayload {
    #[serde(default = "default_true")]
    locked: bool,
}

#[derive(Deserialize)]
struct IconPayload {
    #[serde(default)]
    icon: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Decode one inbound text frame into a command.
pub fn decode_command(text: &str) -> Result<Command, ProtocolError> {
    let frame: Frame = serde_json::from_str(text).map_err(ProtocolError::InvalidFrame)?;
    Command::try_from(frame)
}

impl TryFrom<Frame> for Command {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let Frame { kind, payload } = frame;
        let command = match kind.as_str() {
            "join-game" => {
                let p: JoinPayload = parse_payload(&kind, payload)?;
                let name = sanitize_name(&p.name).ok_or(ProtocolError::EmptyName)?;
                let room_code = match p.room_code.as_deref().map(str::trim) {
                    None | Some("") => None,
                    Some(raw) => {
                        Some(RoomCode::parse(raw).ok_or_else(|| ProtocolError::InvalidRoomCode(raw.to_string()))?)
                    }
                };
                let user_id = p.user_id.filter(|u| !u.trim().is_empty());
                Command::Join(JoinRequest { name, wants_host: p.is_admin, room_code, user_id })
            }
            "start-quiz" => Command::StartQuiz,
            "submit-answer" => {
                let p: AnswerPayload = parse_payload(&kind, payload)?;
                Command::SubmitAnswer { answer_index: p.answer_index }
            }
            "reveal-answers" => Command::RevealAnswers,
            "next-question" => Command::NextQuestion,
            "reset-game" => Command::ResetGame,
            "kick-player" => {
                let p: TargetPayload = parse_payload(&kind, payload)?;
                Command::KickPlayer { player_id: p.player_id }
            }
            "mute-player" => {
                let p: TargetPayload = parse_payload(&kind, payload)?;
                Command::MutePlayer { player_id: p.player_id, muted: p.muted }
            }
            "lock-room" => {
                let p: LockPayload = parse_payload(&kind, payload)?;
                Command::LockRoom { locked: p.locked }
            }
            "update-icon" => {
                let p: IconPayload = parse_payload(&kind, payload)?;
                Command::UpdateIcon { icon: p.icon.as_deref().and_then(sanitize_icon) }
            }
            "close-game" => Command::CloseGame,
            "leave-game" => Command::LeaveGame,
            _ => return Err(ProtocolError::UnknownType(kind)),
        };
        Ok(command)
    }
}

/// Deserialize a payload; a missing payload reads as `{}` so optional-only
/// payloads can be omitted entirely.
fn parse_payload<T: DeserializeOwned>(kind: &str, payload: Option<Value>) -> Result<T, ProtocolError> {
    let value = match payload {
        None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
        Some(v) => v,
    };
    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload { kind: kind.to_string(), source })
}

/// Strip control characters, trim, and cap at `MAX_NAME_CHARS`.
/// Returns `None` when nothing printable is left.
#[must_use]
pub fn sanitize_name(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let truncated: String = cleaned.trim().chars().take(MAX_NAME_CHARS).collect();
    let name = truncated.trim_end();
    if name.is_empty() { None } else { Some(name.to_string()) }
}

fn sanitize_icon(raw: &str) -> Option<String> {
    let icon: String = raw.trim().chars().filter(|c| !c.is_control()).take(MAX_ICON_CHARS).collect();
    if icon.is_empty() { None } else { Some(icon) }
}

// =============================================================================
// OUTBOUND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSuccess {
    pub player_id: Uuid,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
}

/// Server → client events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Event {
    JoinSuccess(JoinSuccess),
    GameStateUpdate(RoomSnapshot),
    Error(ErrorPayload),
    QuizStarted,
    QuizEnded,
    Kicked(Notice),
    GameClosed(Notice),
}

impl Event {
    /// Structured error event from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error(ErrorPayload { code: err.error_code().to_string(), message: err.to_string() })
    }

    /// Wire name of this event, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinSuccess(_) => "join-success",
            Self::GameStateUpdate(_) => "game-state-update",
            Self::Error(_) => "error",
            Self::QuizStarted => "quiz-started",
            Self::QuizEnded => "quiz-ended",
            Self::Kicked(_) => "kicked",
            Self::GameClosed(_) => "game-closed",
        }
    }

    /// True for events after which the receiving connection is no longer
    /// attached to its room.
    #[must_use]
    pub fn detaches(&self) -> bool {
        matches!(self, Self::Kicked(_) | Self::GameClosed(_))
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
