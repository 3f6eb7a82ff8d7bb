use super::*;
use crate::state::test_helpers;
use uuid::Uuid;

struct Fixture {
    room: RoomState,
    host: ConnectionId,
    p1: ConnectionId,
    p2: ConnectionId,
}

fn join_request(name: &str, wants_host: bool) -> Command {
    Command::Join(JoinRequest { name: name.into(), wants_host, room_code: None, user_id: None })
}

/// Room QUIZLINK with host H and players P1, P2, still in the lobby.
fn lobby() -> Fixture {
    let mut room = test_helpers::empty_room_state("QUIZLINK");
    let (host, p1, p2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    apply(&mut room, host, &join_request("H", true)).unwrap();
    apply(&mut room, p1, &join_request("P1", false)).unwrap();
    apply(&mut room, p2, &join_request("P2", false)).unwrap();
    Fixture { room, host, p1, p2 }
}

fn started() -> Fixture {
    let mut f = lobby();
    assert_eq!(apply(&mut f.room, f.host, &Command::StartQuiz), Ok(Effect::Started));
    f
}

fn score(room: &RoomState, id: ConnectionId) -> u32 {
    room.player(id).unwrap().score
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

#[test]
fn join_adds_player_in_order() {
    let f = lobby();
    let names: Vec<&str> = f.room.players.iter().map(|p| p.display_name.as_str()).collect();
    assert_eq!(names, ["H", "P1", "P2"]);
    assert!(f.room.player(f.host).unwrap().is_host);
    assert!(!f.room.player(f.p1).unwrap().is_host);
}

#[test]
fn rejoin_upserts_same_connection() {
    let mut f = lobby();
    apply(&mut f.room, f.p1, &join_request("Renamed", true)).unwrap();
    assert_eq!(f.room.players.len(), 3);
    let p1 = f.room.player(f.p1).unwrap();
    assert_eq!(p1.display_name, "Renamed");
    assert!(p1.is_host);
}

#[test]
fn multiple_hosts_are_permitted() {
    let mut f = lobby();
    let second_host = Uuid::new_v4();
    apply(&mut f.room, second_host, &join_request("H2", true)).unwrap();
    assert_eq!(apply(&mut f.room, second_host, &Command::StartQuiz), Ok(Effect::Started));
}

#[test]
fn join_keeps_user_id_reference() {
    let mut room = test_helpers::empty_room_state("QUIZLINK");
    let id = Uuid::new_v4();
    let cmd = Command::Join(JoinRequest {
        name: "Ana".into(),
        wants_host: false,
        room_code: None,
        user_id: Some("acct-42".into()),
    });
    apply(&mut room, id, &cmd).unwrap();
    assert_eq!(room.player(id).unwrap().user_id.as_deref(), Some("acct-42"));
}

#[test]
fn disconnect_of_unknown_connection_is_unchanged() {
    let mut f = lobby();
    assert_eq!(apply(&mut f.room, Uuid::new_v4(), &Command::Disconnect), Ok(Effect::Unchanged));
    assert_eq!(f.room.players.len(), 3);
}

#[test]
fn leave_game_removes_sender() {
    let mut f = lobby();
    assert_eq!(apply(&mut f.room, f.p2, &Command::LeaveGame), Ok(Effect::Updated));
    assert!(f.room.player(f.p2).is_none());
}

// =============================================================================
// START
// =============================================================================

#[test]
fn start_quiz_resets_scores_and_answer_flags() {
    let mut f = lobby();
    for p in &mut f.room.players {
        p.score = 700;
        p.has_answered = true;
    }
    f.room.answers.insert(f.p1, 0);

    apply(&mut f.room, f.host, &Command::StartQuiz).unwrap();

    assert_eq!(f.room.phase, Phase::InProgress);
    assert_eq!(f.room.current_question_index, 0);
    assert!(f.room.answers.is_empty());
    assert!(f.room.players.iter().all(|p| p.score == 0 && !p.has_answered));
}

#[test]
fn start_quiz_requires_host() {
    let mut f = lobby();
    let err = apply(&mut f.room, f.p1, &Command::StartQuiz).unwrap_err();
    assert_eq!(err, CommandError::NotHost("start-quiz"));
    assert_eq!(err.error_code(), "E_NOT_HOST");
    assert_eq!(f.room.phase, Phase::Lobby);
}

#[test]
fn start_quiz_outside_lobby_is_wrong_phase() {
    let mut f = started();
    let err = apply(&mut f.room, f.host, &Command::StartQuiz).unwrap_err();
    assert_eq!(err, CommandError::WrongPhase { command: "start-quiz", phase: Phase::InProgress });
}

#[test]
fn start_quiz_with_no_players_is_legal() {
    let mut room = test_helpers::empty_room_state("SOLO");
    let host = Uuid::new_v4();
    apply(&mut room, host, &join_request("H", true)).unwrap();
    assert_eq!(apply(&mut room, host, &Command::StartQuiz), Ok(Effect::Started));
}

#[test]
fn commands_from_strangers_are_not_joined() {
    let mut f = lobby();
    let stranger = Uuid::new_v4();
    assert_eq!(apply(&mut f.room, stranger, &Command::StartQuiz), Err(CommandError::NotJoined));
    assert_eq!(
        apply(&mut f.room, stranger, &Command::SubmitAnswer { answer_index: 0 }),
        Err(CommandError::NotJoined)
    );
    assert_eq!(
        apply(&mut f.room, stranger, &Command::UpdateIcon { icon: None }),
        Err(CommandError::NotJoined)
    );
}

// =============================================================================
// SUBMIT
// =============================================================================

#[test]
fn submit_answer_records_once() {
    let mut f = started();
    assert_eq!(apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 1 }), Ok(Effect::Updated));
    assert_eq!(apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 2 }), Ok(Effect::Unchanged));

    assert_eq!(f.room.answers.len(), 1);
    assert_eq!(f.room.answers.get(&f.p1), Some(&1));
    assert!(f.room.player(f.p1).unwrap().has_answered);
    assert!(!f.room.player(f.p2).unwrap().has_answered);
}

#[test]
fn answers_never_exceed_non_host_players() {
    let mut f = started();
    for _ in 0..3 {
        for id in [f.host, f.p1, f.p2] {
            let _ = apply(&mut f.room, id, &Command::SubmitAnswer { answer_index: 0 });
        }
    }
    assert_eq!(f.room.answers.len(), f.room.non_host_count());
    assert!(!f.room.answers.contains_key(&f.host));
}

#[test]
fn submit_answer_rejects_host() {
    let mut f = started();
    let err = apply(&mut f.room, f.host, &Command::SubmitAnswer { answer_index: 0 }).unwrap_err();
    assert_eq!(err, CommandError::HostCannotAnswer);
}

#[test]
fn submit_answer_rejects_out_of_range_index() {
    let mut f = started();
    let err = apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 3 }).unwrap_err();
    assert_eq!(err, CommandError::AnswerOutOfRange { index: 3, options: 3 });
    assert!(f.room.answers.is_empty());
    assert!(!f.room.player(f.p1).unwrap().has_answered);
}

#[test]
fn submit_answer_in_lobby_is_wrong_phase() {
    let mut f = lobby();
    let err = apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 0 }).unwrap_err();
    assert_eq!(err, CommandError::WrongPhase { command: "submit-answer", phase: Phase::Lobby });
}

#[test]
fn submit_after_reveal_is_rejected() {
    let mut f = started();
    apply(&mut f.room, f.host, &Command::RevealAnswers).unwrap();
    let err = apply(&mut f.room, f.p2, &Command::SubmitAnswer { answer_index: 1 }).unwrap_err();
    assert_eq!(err, CommandError::WrongPhase { command: "submit-answer", phase: Phase::Reveal });
    assert_eq!(score(&f.room, f.p2), 0);
}

#[test]
fn muted_player_cannot_answer() {
    let mut f = started();
    apply(&mut f.room, f.host, &Command::MutePlayer { player_id: f.p1, muted: true }).unwrap();
    assert_eq!(apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 1 }), Err(CommandError::Muted));

    apply(&mut f.room, f.host, &Command::MutePlayer { player_id: f.p1, muted: false }).unwrap();
    assert_eq!(apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 1 }), Ok(Effect::Updated));
}

#[test]
fn repeat_submit_after_mute_is_still_a_no_op() {
    let mut f = started();
    apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 1 }).unwrap();
    apply(&mut f.room, f.host, &Command::MutePlayer { player_id: f.p1, muted: true }).unwrap();

    assert_eq!(apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 2 }), Ok(Effect::Unchanged));
    assert_eq!(f.room.answers.get(&f.p1), Some(&1));
}

#[test]
fn rejoining_as_host_drops_recorded_answer() {
    let mut f = started();
    apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 1 }).unwrap();

    assert_eq!(apply(&mut f.room, f.p1, &join_request("P1", true)), Ok(Effect::Updated));
    let p1 = f.room.player(f.p1).unwrap();
    assert!(p1.is_host);
    assert!(!p1.has_answered);
    assert!(!f.room.answers.contains_key(&f.p1));
    assert!(f.room.answers.len() <= f.room.non_host_count());

    apply(&mut f.room, f.host, &Command::RevealAnswers).unwrap();
    assert_eq!(score(&f.room, f.p1), 0);
}

// =============================================================================
// REVEAL / NEXT
// =============================================================================

#[test]
fn reveal_awards_points_for_correct_answers() {
    let mut f = started();
    apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 1 }).unwrap();
    apply(&mut f.room, f.p2, &Command::SubmitAnswer { answer_index: 0 }).unwrap();

    assert_eq!(apply(&mut f.room, f.host, &Command::RevealAnswers), Ok(Effect::Updated));

    assert_eq!(f.room.phase, Phase::Reveal);
    assert_eq!(score(&f.room, f.p1), CORRECT_ANSWER_POINTS);
    assert_eq!(score(&f.room, f.p2), 0);
    assert_eq!(score(&f.room, f.host), 0);
}

#[test]
fn reveal_with_no_answers_awards_nothing() {
    let mut f = started();
    apply(&mut f.room, f.host, &Command::RevealAnswers).unwrap();
    assert!(f.room.players.iter().all(|p| p.score == 0));
}

#[test]
fn reveal_requires_host_before_phase() {
    let mut f = lobby();
    assert_eq!(
        apply(&mut f.room, f.p1, &Command::RevealAnswers),
        Err(CommandError::NotHost("reveal-answers"))
    );
    assert_eq!(
        apply(&mut f.room, f.host, &Command::RevealAnswers),
        Err(CommandError::WrongPhase { command: "reveal-answers", phase: Phase::Lobby })
    );
}

#[test]
fn disconnected_answer_is_retained_and_not_scored() {
    let mut f = started();
    apply(&mut f.room, f.p2, &Command::SubmitAnswer { answer_index: 1 }).unwrap();
    apply(&mut f.room, f.p2, &Command::Disconnect).unwrap();

    assert!(f.room.player(f.p2).is_none());
    assert_eq!(f.room.answers.get(&f.p2), Some(&1));

    apply(&mut f.room, f.host, &Command::RevealAnswers).unwrap();
    assert_eq!(f.room.phase, Phase::Reveal);
    assert_eq!(f.room.answers.get(&f.p2), Some(&1));
}

#[test]
fn next_question_advances_and_clears_round() {
    let mut f = started();
    apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 1 }).unwrap();
    apply(&mut f.room, f.host, &Command::RevealAnswers).unwrap();

    assert_eq!(apply(&mut f.room, f.host, &Command::NextQuestion), Ok(Effect::Updated));

    assert_eq!(f.room.phase, Phase::InProgress);
    assert_eq!(f.room.current_question_index, 1);
    assert!(f.room.answers.is_empty());
    assert!(!f.room.player(f.p1).unwrap().has_answered);
    assert_eq!(score(&f.room, f.p1), CORRECT_ANSWER_POINTS);
}

#[test]
fn next_question_requires_reveal_phase() {
    let mut f = started();
    assert_eq!(
        apply(&mut f.room, f.host, &Command::NextQuestion),
        Err(CommandError::WrongPhase { command: "next-question", phase: Phase::InProgress })
    );
}

#[test]
fn next_question_after_last_ends_quiz() {
    let mut f = started();
    let total = f.room.questions.len();
    for _ in 0..total - 1 {
        apply(&mut f.room, f.host, &Command::RevealAnswers).unwrap();
        assert_eq!(apply(&mut f.room, f.host, &Command::NextQuestion), Ok(Effect::Updated));
    }
    apply(&mut f.room, f.host, &Command::RevealAnswers).unwrap();
    assert_eq!(apply(&mut f.room, f.host, &Command::NextQuestion), Ok(Effect::Ended));
    assert_eq!(f.room.phase, Phase::Ended);

    let err = apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 0 }).unwrap_err();
    assert!(matches!(err, CommandError::WrongPhase { phase: Phase::Ended, .. }));
}

// =============================================================================
// RESET
// =============================================================================

#[test]
fn reset_returns_to_lobby_from_any_phase() {
    let mut f = started();
    apply(&mut f.room, f.p1, &Command::SubmitAnswer { answer_index: 1 }).unwrap();
    apply(&mut f.room, f.host, &Command::RevealAnswers).unwrap();

    assert_eq!(apply(&mut f.room, f.host, &Command::ResetGame), Ok(Effect::Updated));

    assert_eq!(f.room.phase, Phase::Lobby);
    assert_eq!(f.room.current_question_index, -1);
    assert!(f.room.answers.is_empty());
    assert!(f.room.players.iter().all(|p| p.score == 0 && !p.has_answered));
}

#[test]
fn reset_requires_host() {
    let mut f = started();
    assert_eq!(apply(&mut f.room, f.p2, &Command::ResetGame), Err(CommandError::NotHost("reset-game")));
    assert_eq!(f.room.phase, Phase::InProgress);
}

// =============================================================================
// MODERATION
// =============================================================================

#[test]
fn kick_removes_target() {
    let mut f = lobby();
    assert_eq!(
        apply(&mut f.room, f.host, &Command::KickPlayer { player_id: f.p1 }),
        Ok(Effect::Kicked(f.p1))
    );
    assert!(f.room.player(f.p1).is_none());
}

#[test]
fn kick_rejects_self_unknown_and_non_host() {
    let mut f = lobby();
    assert_eq!(
        apply(&mut f.room, f.host, &Command::KickPlayer { player_id: f.host }),
        Err(CommandError::SelfTarget("kick"))
    );
    let ghost = Uuid::new_v4();
    assert_eq!(
        apply(&mut f.room, f.host, &Command::KickPlayer { player_id: ghost }),
        Err(CommandError::UnknownPlayer(ghost))
    );
    assert_eq!(
        apply(&mut f.room, f.p1, &Command::KickPlayer { player_id: f.p2 }),
        Err(CommandError::NotHost("kick-player"))
    );
    assert_eq!(f.room.players.len(), 3);
}

#[test]
fn lock_blocks_new_members_only() {
    let mut f = lobby();
    assert_eq!(apply(&mut f.room, f.host, &Command::LockRoom { locked: true }), Ok(Effect::Updated));
    assert_eq!(apply(&mut f.room, f.host, &Command::LockRoom { locked: true }), Ok(Effect::Unchanged));

    assert_eq!(
        apply(&mut f.room, Uuid::new_v4(), &join_request("Late", false)),
        Err(CommandError::RoomLocked)
    );
    assert_eq!(apply(&mut f.room, f.p1, &join_request("P1b", false)), Ok(Effect::Updated));

    apply(&mut f.room, f.host, &Command::LockRoom { locked: false }).unwrap();
    assert_eq!(apply(&mut f.room, Uuid::new_v4(), &join_request("Late", false)), Ok(Effect::Updated));
}

#[test]
fn update_icon_sets_and_clears() {
    let mut f = lobby();
    let set = Command::UpdateIcon { icon: Some("fox".into()) };
    assert_eq!(apply(&mut f.room, f.p1, &set), Ok(Effect::Updated));
    assert_eq!(apply(&mut f.room, f.p1, &set), Ok(Effect::Unchanged));
    assert_eq!(f.room.player(f.p1).unwrap().icon.as_deref(), Some("fox"));

    apply(&mut f.room, f.p1, &Command::UpdateIcon { icon: None }).unwrap();
    assert!(f.room.player(f.p1).unwrap().icon.is_none());
}

#[test]
fn close_game_is_host_only_and_keeps_phase() {
    let mut f = started();
    assert_eq!(apply(&mut f.room, f.p1, &Command::CloseGame), Err(CommandError::NotHost("close-game")));
    assert_eq!(apply(&mut f.room, f.host, &Command::CloseGame), Ok(Effect::Closed));
    assert_eq!(f.room.phase, Phase::InProgress);
}
