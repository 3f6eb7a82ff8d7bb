//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the room registry, the question bank shared by new rooms, and
//! the server config. Each room sits behind its own `tokio::sync::Mutex`
//! so every command for that room is applied in one serialized order,
//! while the registry map has a separate `RwLock` used only for
//! insert-if-absent and lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::frame::Event;
use crate::quiz::{Question, QuestionSet};

/// Identifies one transport connection. Doubles as the player id.
pub type ConnectionId = Uuid;

/// Max room code length after normalization.
pub const MAX_ROOM_CODE_LEN: usize = 16;

/// Length of server-allocated room codes.
pub const GENERATED_CODE_LEN: usize = 6;

/// Alphabet for allocated codes; omits 0/O and 1/I.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// =============================================================================
// ROOM CODE
// =============================================================================

/// Normalized room code: upper-case ASCII alphanumerics, 1..=16 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Trim and upper-case `raw`. Returns `None` if the result is empty, too
    /// long, or contains anything other than ASCII letters and digits.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() || code.len() > MAX_ROOM_CODE_LEN {
            return None;
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(code))
    }

    /// Random `GENERATED_CODE_LEN`-character code from `CODE_ALPHABET`.
    #[must_use]
    pub fn random() -> Self {
        let mut rng = rand::rng();
        let code = (0..GENERATED_CODE_LEN)
            .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PLAYER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub score: u32,
    pub is_host: bool,
    pub has_answered: bool,
    pub icon: Option<String>,
    pub muted: bool,
    /// Opaque account reference forwarded by the client. Never an identity key.
    pub user_id: Option<String>,
}

impl Player {
    #[must_use]
    pub fn new(connection_id: ConnectionId, display_name: impl Into<String>, is_host: bool) -> Self {
        Self {
            connection_id,
            display_name: display_name.into(),
            score: 0,
            is_host,
            has_answered: false,
            icon: None,
            muted: false,
            user_id: None,
        }
    }
}

// =============================================================================
// ROOM STATE
// =============================================================================

/// Stage of a room's quiz lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Lobby,
    InProgress,
    Reveal,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "lobby",
            Self::InProgress => "in-progress",
            Self::Reveal => "reveal",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Authoritative record for one quiz session. Only mutated through
/// `services::command::apply` while the owning `Room` lock is held.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room_code: RoomCode,
    /// Join order is preserved for the roster.
    pub players: Vec<Player>,
    pub phase: Phase,
    /// −1 while in the lobby.
    pub current_question_index: i32,
    /// Recorded answers for the current question. Entries outlive a
    /// disconnect so a departed player's answer still counts at reveal.
    pub answers: HashMap<ConnectionId, usize>,
    pub questions: Arc<QuestionSet>,
    pub locked: bool,
}

impl RoomState {
    #[must_use]
    pub fn new(room_code: RoomCode, questions: Arc<QuestionSet>) -> Self {
        Self {
            room_code,
            players: Vec::new(),
            phase: Phase::Lobby,
            current_question_index: -1,
            answers: HashMap::new(),
            questions,
            locked: false,
        }
    }

    #[must_use]
    pub fn player(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.connection_id == id)
    }

    pub fn player_mut(&mut self, id: ConnectionId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.connection_id == id)
    }

    /// Remove a player, returning it. Recorded answers are left in place.
    pub fn remove_player(&mut self, id: ConnectionId) -> Option<Player> {
        let pos = self.players.iter().position(|p| p.connection_id == id)?;
        Some(self.players.remove(pos))
    }

    #[must_use]
    pub fn non_host_count(&self) -> usize {
        self.players.iter().filter(|p| !p.is_host).count()
    }

    /// The question at the current index, if the index points into the bank.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        let index = usize::try_from(self.current_question_index).ok()?;
        self.questions.get(index)
    }
}

// =============================================================================
// ROOM
// =============================================================================

/// A room plus the live connections attached to it.
#[derive(Debug)]
pub struct Room {
    pub state: RoomState,
    /// Attached connections: `connection_id` -> sender for outgoing events.
    pub clients: HashMap<ConnectionId, mpsc::Sender<Event>>,
    /// Bumped on every state-changing command; stamped on each snapshot.
    pub version: u64,
    /// Set by close-game. A closed room rejects every further command.
    pub closed: bool,
}

impl Room {
    #[must_use]
    pub fn new(room_code: RoomCode, questions: Arc<QuestionSet>) -> Self {
        Self { state: RoomState::new(room_code, questions), clients: HashMap::new(), version: 0, closed: false }
    }
}

pub type RoomHandle = Arc<Mutex<Room>>;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomCode, RoomHandle>>>,
    /// Bank handed to every room created from now on.
    pub questions: Arc<QuestionSet>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, questions: QuestionSet) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), questions: Arc::new(questions), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
