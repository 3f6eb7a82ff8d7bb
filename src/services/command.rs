//! Command processor: the room state machine.
//!
//! DESIGN
//! ======
//! `apply` validates one command from one sender against a `RoomState` and
//! either mutates the state and returns an `Effect`, or returns a
//! `CommandError` with the state untouched. It performs no I/O and never
//! awaits; the caller holds the room lock and turns the effect into
//! outbound events.
//!
//! PHASES
//! ======
//! Lobby → InProgress → Reveal → InProgress → ... → Ended.
//! ResetGame returns any phase to Lobby. Phase commands are host-only;
//! host checks run before phase checks so a non-host always learns that
//! it lacks permission rather than that the timing was wrong.

use crate::frame::ErrorCode;
use crate::state::{ConnectionId, Phase, Player, RoomCode, RoomState};

/// Points awarded per correct answer at reveal.
pub const CORRECT_ANSWER_POINTS: u32 = 100;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Already sanitized and non-empty.
    pub name: String,
    pub wants_host: bool,
    pub room_code: Option<RoomCode>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(JoinRequest),
    StartQuiz,
    SubmitAnswer { answer_index: usize },
    RevealAnswers,
    NextQuestion,
    ResetGame,
    KickPlayer { player_id: ConnectionId },
    MutePlayer { player_id: ConnectionId, muted: bool },
    LockRoom { locked: bool },
    UpdateIcon { icon: Option<String> },
    CloseGame,
    LeaveGame,
    /// Synthesized on transport close; never decoded from the wire.
    Disconnect,
}

impl Command {
    /// Wire-style name, for logs and error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join-game",
            Self::StartQuiz => "start-quiz",
            Self::SubmitAnswer { .. } => "submit-answer",
            Self::RevealAnswers => "reveal-answers",
            Self::NextQuestion => "next-question",
            Self::ResetGame => "reset-game",
            Self::KickPlayer { .. } => "kick-player",
            Self::MutePlayer { .. } => "mute-player",
            Self::LockRoom { .. } => "lock-room",
            Self::UpdateIcon { .. } => "update-icon",
            Self::CloseGame => "close-game",
            Self::LeaveGame => "leave-game",
            Self::Disconnect => "disconnect",
        }
    }
}

/// What a successful command did, beyond mutating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Accepted but nothing changed (repeat answer, unknown disconnect).
    Unchanged,
    /// State changed; broadcast a snapshot.
    Updated,
    /// Quiz moved from lobby to the first question.
    Started,
    /// Quiz finished after the last question.
    Ended,
    /// Target player was removed and must be detached.
    Kicked(ConnectionId),
    /// Host closed the room.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("join the room first")]
    NotJoined,
    #[error("only the host can {0}")]
    NotHost(&'static str),
    #[error("cannot {command} while the room is {phase}")]
    WrongPhase { command: &'static str, phase: Phase },
    #[error("the host cannot submit answers")]
    HostCannotAnswer,
    #[error("you are muted")]
    Muted,
    #[error("answer index {index} out of range (question has {options} options)")]
    AnswerOutOfRange { index: usize, options: usize },
    #[error("no player {0} in this room")]
    UnknownPlayer(ConnectionId),
    #[error("cannot {0} yourself")]
    SelfTarget(&'static str),
    #[error("room is locked")]
    RoomLocked,
}

impl ErrorCode for CommandError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined => "E_NOT_JOINED",
            Self::NotHost(_) => "E_NOT_HOST",
            Self::WrongPhase { .. } => "E_WRONG_PHASE",
            Self::HostCannotAnswer => "E_HOST_CANNOT_ANSWER",
            Self::Muted => "E_MUTED",
            Self::AnswerOutOfRange { .. } => "E_ANSWER_OUT_OF_RANGE",
            Self::UnknownPlayer(_) => "E_UNKNOWN_PLAYER",
            Self::SelfTarget(_) => "E_INVALID_TARGET",
            Self::RoomLocked => "E_ROOM_LOCKED",
        }
    }
}

// =============================================================================
// APPLY
// =============================================================================

/// Apply `command` from `sender` to `room`.
///
/// # Errors
///
/// Returns the rejection reason; `room` is left unchanged in that case.
pub fn apply(room: &mut RoomState, sender: ConnectionId, command: &Command) -> Result<Effect, CommandError> {
    match command {
        Command::Join(req) => join(room, sender, req),
        Command::Disconnect | Command::LeaveGame => Ok(leave(room, sender)),
        Command::UpdateIcon { icon } => {
            let player = room.player_mut(sender).ok_or(CommandError::NotJoined)?;
            if player.icon == *icon {
                return Ok(Effect::Unchanged);
            }
            player.icon.clone_from(icon);
            Ok(Effect::Updated)
        }
        Command::SubmitAnswer { answer_index } => submit_answer(room, sender, *answer_index),
        Command::StartQuiz => {
            require_host(room, sender, command)?;
            require_phase(room, command, &[Phase::Lobby])?;
            room.phase = Phase::InProgress;
            room.current_question_index = 0;
            clear_round(room);
            for p in &mut room.players {
                p.score = 0;
            }
            Ok(Effect::Started)
        }
        Command::RevealAnswers => {
            require_host(room, sender, command)?;
            require_phase(room, command, &[Phase::InProgress])?;
            reveal(room);
            Ok(Effect::Updated)
        }
        Command::NextQuestion => {
            require_host(room, sender, command)?;
            require_phase(room, command, &[Phase::Reveal])?;
            let next = room.current_question_index + 1;
            if usize::try_from(next).is_ok_and(|n| n < room.questions.len()) {
                room.current_question_index = next;
                room.phase = Phase::InProgress;
                clear_round(room);
                Ok(Effect::Updated)
            } else {
                room.phase = Phase::Ended;
                Ok(Effect::Ended)
            }
        }
        Command::ResetGame => {
            require_host(room, sender, command)?;
            room.phase = Phase::Lobby;
            room.current_question_index = -1;
            clear_round(room);
            for p in &mut room.players {
                p.score = 0;
            }
            Ok(Effect::Updated)
        }
        Command::KickPlayer { player_id } => {
            require_host(room, sender, command)?;
            if *player_id == sender {
                return Err(CommandError::SelfTarget("kick"));
            }
            room
                .remove_player(*player_id)
                .ok_or(CommandError::UnknownPlayer(*player_id))?;
            Ok(Effect::Kicked(*player_id))
        }
        Command::MutePlayer { player_id, muted } => {
            require_host(room, sender, command)?;
            let target = room
                .player_mut(*player_id)
                .ok_or(CommandError::UnknownPlayer(*player_id))?;
            if target.muted == *muted {
                return Ok(Effect::Unchanged);
            }
            target.muted = *muted;
            Ok(Effect::Updated)
        }
        Command::LockRoom { locked } => {
            require_host(room, sender, command)?;
            if room.locked == *locked {
                return Ok(Effect::Unchanged);
            }
            room.locked = *locked;
            Ok(Effect::Updated)
        }
        Command::CloseGame => {
            require_host(room, sender, command)?;
            Ok(Effect::Closed)
        }
    }
}

fn join(room: &mut RoomState, sender: ConnectionId, req: &JoinRequest) -> Result<Effect, CommandError> {
    if let Some(player) = room.player_mut(sender) {
        player.display_name.clone_from(&req.name);
        player.is_host = req.wants_host;
        player.user_id.clone_from(&req.user_id);
        if player.is_host {
            // Hosts never hold an answer for the current question.
            player.has_answered = false;
            room.answers.remove(&sender);
        }
        return Ok(Effect::Updated);
    }
    if room.locked {
        return Err(CommandError::RoomLocked);
    }
    let mut player = Player::new(sender, req.name.clone(), req.wants_host);
    player.user_id.clone_from(&req.user_id);
    room.players.push(player);
    Ok(Effect::Updated)
}

fn leave(room: &mut RoomState, sender: ConnectionId) -> Effect {
    match room.remove_player(sender) {
        Some(_) => Effect::Updated,
        None => Effect::Unchanged,
    }
}

fn submit_answer(room: &mut RoomState, sender: ConnectionId, answer_index: usize) -> Result<Effect, CommandError> {
    let Some(player) = room.player(sender) else {
        return Err(CommandError::NotJoined);
    };
    if room.phase != Phase::InProgress {
        return Err(CommandError::WrongPhase { command: "submit-answer", phase: room.phase });
    }
    if player.is_host {
        return Err(CommandError::HostCannotAnswer);
    }
    if player.has_answered || room.answers.contains_key(&sender) {
        return Ok(Effect::Unchanged);
    }
    if player.muted {
        return Err(CommandError::Muted);
    }
    let options = room.current_question().map_or(0, |q| q.options.len());
    if answer_index >= options {
        return Err(CommandError::AnswerOutOfRange { index: answer_index, options });
    }

    room.answers.insert(sender, answer_index);
    if let Some(player) = room.player_mut(sender) {
        player.has_answered = true;
    }
    Ok(Effect::Updated)
}

/// Move to Reveal and award points for every correct recorded answer.
/// Answers from players who already left are skipped.
fn reveal(room: &mut RoomState) {
    room.phase = Phase::Reveal;
    let Some(question) = room.current_question() else {
        return;
    };
    let winners: Vec<ConnectionId> = room
        .answers
        .iter()
        .filter(|&(_, &choice)| question.is_correct(choice))
        .map(|(id, _)| *id)
        .collect();
    for id in winners {
        if let Some(player) = room.player_mut(id) {
            player.score = player.score.saturating_add(CORRECT_ANSWER_POINTS);
        }
    }
}

fn clear_round(room: &mut RoomState) {
    room.answers.clear();
    for p in &mut room.players {
        p.has_answered = false;
    }
}

fn require_host(room: &RoomState, sender: ConnectionId, command: &Command) -> Result<(), CommandError> {
    match room.player(sender) {
        None => Err(CommandError::NotJoined),
        Some(p) if !p.is_host => Err(CommandError::NotHost(command.name())),
        Some(_) => Ok(()),
    }
}

fn require_phase(room: &RoomState, command: &Command, legal: &[Phase]) -> Result<(), CommandError> {
    if legal.contains(&room.phase) {
        Ok(())
    } else {
        Err(CommandError::WrongPhase { command: command.name(), phase: room.phase })
    }
}

#[cfg(test)]
#[path = "command_test.rs"]
mod tests;
