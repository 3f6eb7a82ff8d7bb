//! Snapshot: the redacted public view of a room.
//!
//! The correct option index is withheld unless the room is in the Reveal
//! phase. Every client of a room receives the same snapshot for the same
//! version, so there is no per-recipient variant of this view.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::state::{Phase, RoomCode, RoomState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub score: u32,
    pub is_admin: bool,
    pub has_answered: bool,
    pub icon: Option<String>,
    pub is_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
    /// `None` until the answers are revealed.
    pub correct_answer: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_code: RoomCode,
    pub version: u64,
    pub phase: Phase,
    pub players: Vec<PlayerView>,
    pub current_question: i32,
    pub is_quiz_active: bool,
    pub show_results: bool,
    pub total_questions: usize,
    pub question: Option<QuestionView>,
    /// Keyed by connection id; sorted for stable output.
    pub answers: BTreeMap<String, usize>,
    pub is_locked: bool,
}

/// Build the broadcast-safe view of `room` at `version`.
#[must_use]
pub fn snapshot(room: &RoomState, version: u64) -> RoomSnapshot {
    let show_results = room.phase == Phase::Reveal;
    let is_quiz_active = matches!(room.phase, Phase::InProgress | Phase::Reveal);

    let players = room
        .players
        .iter()
        .map(|p| PlayerView {
            id: p.connection_id.to_string(),
            name: p.display_name.clone(),
            score: p.score,
            is_admin: p.is_host,
            has_answered: p.has_answered,
            icon: p.icon.clone(),
            is_muted: p.muted,
        })
        .collect();

    let question = if is_quiz_active {
        room.current_question().map(|q| QuestionView {
            text: q.text.clone(),
            options: q.options.clone(),
            correct_answer: show_results.then_some(q.correct_option_index),
        })
    } else {
        None
    };

    let answers = room
        .answers
        .iter()
        .map(|(id, choice)| (id.to_string(), *choice))
        .collect();

    RoomSnapshot {
        room_code: room.room_code.clone(),
        version,
        phase: room.phase,
        players,
        current_question: room.current_question_index,
        is_quiz_active,
        show_results,
        total_questions: room.questions.len(),
        question,
        answers,
        is_locked: room.locked,
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
