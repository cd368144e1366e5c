//! Tests for the survey state machine.

use super::*;
use crate::answer::Judgment;
use crate::catalog::{Question, QuestionKind};
use crate::config::SurveyConfig;
use crate::generation::GeneratedImage;
use tempfile::TempDir;

fn default_catalog(pad_to: Option<usize>) -> Arc<Catalog> {
    let config = SurveyConfig::default_config().expect("embedded config should be valid");
    let catalog = Catalog::new(config.catalog).expect("catalog should validate");
    Arc::new(catalog.with_pad_to(pad_to))
}

fn create_logger(temp_dir: &TempDir) -> Arc<StructuredLogger> {
    let logs_dir = temp_dir.path().join("logs");
    Arc::new(StructuredLogger::new("test-session", &logs_dir).expect("Failed to create logger"))
}

/// Creates a test state machine over the default catalog.
pub(super) fn create_test_machine(
    pad_to: Option<usize>,
) -> (SurveyStateMachine, watch::Receiver<StateSnapshot>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = create_logger(&temp_dir);
    let (machine, snapshot_rx) = SurveyStateMachine::new(default_catalog(pad_to), logger);
    (machine, snapshot_rx, temp_dir)
}

fn select(machine: &mut SurveyStateMachine, role_id: &str) {
    machine
        .apply(SurveyCommand::SelectRole {
            role_id: role_id.to_string(),
        })
        .expect("SelectRole should succeed");
}

/// An answer satisfying the question's completion condition.
pub(super) fn valid_answer(question: &Question) -> Answer {
    match &question.kind {
        QuestionKind::FreeText { .. } => Answer::Text("looks fine".into()),
        QuestionKind::SingleChoice { options, .. } => Answer::Choice(options[0].clone()),
        QuestionKind::Scale { default, .. } => Answer::Score(*default),
        QuestionKind::StaticImageCompare { .. } | QuestionKind::GenerateAndCompare { .. } => {
            Answer::Judgment(Judgment::FirstBetter)
        }
    }
}

pub(super) fn sample_pair() -> GeneratedPair {
    let image = |backend: &str| GeneratedImage {
        bytes: vec![0x89, b'P', b'N', b'G'],
        width: 8,
        height: 8,
        backend: backend.to_string(),
        saved_to: None,
    };
    GeneratedPair {
        first: image("first"),
        second: image("second"),
    }
}

fn begin(machine: &mut SurveyStateMachine, prompt: &str) -> Vec<SurveyEvent> {
    let question_index = machine.session().current_index().expect("asking phase");
    machine
        .apply(SurveyCommand::BeginGeneration {
            question_index,
            prompt: prompt.to_string(),
        })
        .expect("BeginGeneration should be accepted")
}

/// Runs a successful generation for the current question.
fn generate(machine: &mut SurveyStateMachine) {
    let ticket = begin(machine, "a fox made of paper")
        .iter()
        .find_map(SurveyEvent::generation_ticket)
        .expect("generation should start");
    machine
        .apply(SurveyCommand::FinishGeneration {
            ticket,
            result: Ok(sample_pair()),
        })
        .expect("FinishGeneration never fails");
}

/// Answers the current question validly and advances.
fn answer_and_advance(machine: &mut SurveyStateMachine) -> Vec<SurveyEvent> {
    let index = machine.session().current_index().expect("asking phase");
    let question = machine.session().questions[index].clone();
    if question.is_generative() {
        generate(machine);
    }
    let events = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: index,
            answer: valid_answer(&question),
        })
        .expect("RecordAnswer should succeed");
    assert!(
        matches!(events[0], SurveyEvent::AnswerRecorded { .. }),
        "unexpected {:?}",
        events
    );
    machine
        .apply(SurveyCommand::Advance)
        .expect("Advance should succeed")
}

#[test]
fn test_select_role_binds_questions() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine(Some(10));

    let events = machine
        .apply(SurveyCommand::SelectRole {
            role_id: "designer".into(),
        })
        .expect("SelectRole should succeed");

    assert_eq!(
        events,
        vec![
            SurveyEvent::RoleSelected {
                role: Role::Designer,
                question_count: 10
            },
            SurveyEvent::StepChanged { from: 0, to: 1 },
        ]
    );
    assert_eq!(machine.session().phase(), Phase::Asking);

    let snapshot = snapshot_rx.borrow();
    assert_eq!(snapshot.step_index, 1);
    assert_eq!(snapshot.total_questions, 10);
    assert_eq!(
        snapshot.current_question.as_ref().map(|q| q.key.as_str()),
        Some("ab_anatomy")
    );
}

#[test]
fn test_every_role_yields_non_empty_sequence() {
    for role in Role::ALL {
        let (mut machine, _rx, _temp) = create_test_machine(None);
        select(&mut machine, role.id());
        assert!(machine.session().total_questions() > 0);
    }
}

#[test]
fn test_newbie_alias_selects_public() {
    let (mut machine, _rx, _temp) = create_test_machine(None);
    select(&mut machine, "newbie");
    assert_eq!(machine.session().role, Some(Role::Public));
}

#[test]
fn test_unknown_role_stays_in_role_selection() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine(Some(10));

    let err = machine
        .apply(SurveyCommand::SelectRole {
            role_id: "painter".into(),
        })
        .unwrap_err();

    assert!(matches!(err, SurveyError::UnknownRole { .. }));
    assert_eq!(machine.session().step_index, 0);
    assert!(machine.session().questions.is_empty());
    assert_eq!(snapshot_rx.borrow().phase, Phase::RoleSelection);
}

#[test]
fn test_role_cannot_be_selected_twice() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "expert");

    let err = machine
        .apply(SurveyCommand::SelectRole {
            role_id: "public".into(),
        })
        .unwrap_err();

    assert_eq!(err, SurveyError::RoleAlreadySelected);
    assert_eq!(machine.session().role, Some(Role::Expert));
}

#[test]
fn test_designer_first_answer_scenario() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "designer");
    assert_eq!(machine.session().total_questions(), 10);

    machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 0,
            answer: Answer::Judgment(Judgment::FirstBetter),
        })
        .unwrap();
    let events = machine.apply(SurveyCommand::Advance).unwrap();

    assert_eq!(events, vec![SurveyEvent::StepChanged { from: 1, to: 2 }]);
    assert_eq!(machine.session().step_index, 2);
    assert_eq!(machine.session().answers.len(), 1);
    assert_eq!(
        machine.session().answers.get(&0),
        Some(&Answer::Judgment(Judgment::FirstBetter))
    );
}

#[test]
fn test_record_then_advance_adds_exactly_one_answer() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "public");

    for expected in 1..=4 {
        answer_and_advance(&mut machine);
        assert_eq!(machine.session().answers.len(), expected);
        assert_eq!(machine.session().step_index, expected + 1);
    }
}

#[test]
fn test_advance_blocked_without_answer() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "designer");

    let events = machine.apply(SurveyCommand::Advance).unwrap();

    assert_eq!(
        events,
        vec![SurveyEvent::AdvanceBlocked {
            question_index: 0,
            reason: BlockReason::Unanswered
        }]
    );
    assert_eq!(machine.session().step_index, 1);
    assert!(machine.session().answers.is_empty());
    assert_eq!(snapshot_rx.borrow().step_index, 1);
}

#[test]
fn test_record_does_not_advance_and_overwrites() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "designer");

    for judgment in [Judgment::FirstBetter, Judgment::NoDifference] {
        machine
            .apply(SurveyCommand::RecordAnswer {
                question_index: 0,
                answer: Answer::Judgment(judgment),
            })
            .unwrap();
    }

    assert_eq!(machine.session().step_index, 1);
    assert_eq!(machine.session().answers.len(), 1);
    assert_eq!(
        snapshot_rx.borrow().current_answer,
        Some(Answer::Judgment(Judgment::NoDifference))
    );
}

#[test]
fn test_record_for_wrong_question_or_shape_is_error() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "designer");

    let err = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 3,
            answer: Answer::Judgment(Judgment::FirstBetter),
        })
        .unwrap_err();
    assert_eq!(
        err,
        SurveyError::QuestionMismatch {
            expected: 0,
            got: 3
        }
    );

    let err = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 0,
            answer: Answer::Score(4),
        })
        .unwrap_err();
    assert!(matches!(err, SurveyError::AnswerKindMismatch { .. }));
    assert!(machine.session().answers.is_empty());
}

#[test]
fn test_record_before_role_selection_is_error() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));
    let err = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 0,
            answer: Answer::Score(4),
        })
        .unwrap_err();
    assert!(matches!(err, SurveyError::InvalidTransition { .. }));

    let err = machine.apply(SurveyCommand::Advance).unwrap_err();
    assert!(matches!(err, SurveyError::InvalidTransition { .. }));
}

#[test]
fn test_scale_and_choice_gating() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "public");

    let events = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 0,
            answer: Answer::Choice("Paint my cat".into()),
        })
        .unwrap();
    assert_eq!(events[0].blocked_reason(), Some(BlockReason::UnknownOption));
    assert!(machine.session().answers.is_empty());

    answer_and_advance(&mut machine); // img2img_wish
    answer_and_advance(&mut machine); // magic_canvas
    answer_and_advance(&mut machine); // ab_aesthetic
    answer_and_advance(&mut machine); // speed_perception

    let events = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 4,
            answer: Answer::Score(11),
        })
        .unwrap();
    assert_eq!(events[0].blocked_reason(), Some(BlockReason::ScoreOutOfRange));
    assert!(!machine.session().answers.contains_key(&4));
}

#[test]
fn test_empty_free_text_rejected_and_optional_skip() {
    let (mut machine, _rx, _temp) = create_test_machine(None);
    select(&mut machine, "expert");
    answer_and_advance(&mut machine); // ab_semantic
    answer_and_advance(&mut machine); // ab_text
    answer_and_advance(&mut machine); // stress_prompt

    let question = machine.session().current_question().unwrap().clone();
    assert_eq!(question.key, "corner_case_notes");

    let events = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 3,
            answer: Answer::Text("   ".into()),
        })
        .unwrap();
    assert_eq!(
        events,
        vec![SurveyEvent::AnswerRejected {
            question_index: 3,
            reason: BlockReason::EmptyText
        }]
    );
    assert!(!machine.session().answers.contains_key(&3));

    // Optional question: advancing without an answer is a skip
    let events = machine.apply(SurveyCommand::Advance).unwrap();
    assert_eq!(events, vec![SurveyEvent::StepChanged { from: 4, to: 5 }]);
    assert!(!machine.session().answers.contains_key(&3));
}

#[test]
fn test_retreat_then_advance_restores_step() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "designer");
    answer_and_advance(&mut machine);
    answer_and_advance(&mut machine);
    let answers_before = machine.session().answers.clone();
    assert_eq!(machine.session().step_index, 3);

    let events = machine.apply(SurveyCommand::Retreat).unwrap();
    assert_eq!(events, vec![SurveyEvent::StepChanged { from: 3, to: 2 }]);
    assert_eq!(machine.session().answers, answers_before);

    machine.apply(SurveyCommand::Advance).unwrap();
    assert_eq!(machine.session().step_index, 3);
    assert_eq!(machine.session().answers, answers_before);
}

#[test]
fn test_retreat_from_first_question_is_error() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));

    let err = machine.apply(SurveyCommand::Retreat).unwrap_err();
    assert!(matches!(err, SurveyError::InvalidTransition { .. }));

    select(&mut machine, "public");
    let err = machine.apply(SurveyCommand::Retreat).unwrap_err();
    assert!(matches!(err, SurveyError::InvalidTransition { .. }));
    assert_eq!(machine.session().step_index, 1);
}

#[test]
fn test_reset_equals_fresh_session() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "public");
    answer_and_advance(&mut machine);
    answer_and_advance(&mut machine);
    let old_id = machine.session().session_id.clone();

    let events = machine.apply(SurveyCommand::Reset).unwrap();

    assert_eq!(
        events,
        vec![SurveyEvent::SessionReset {
            previous_session_id: old_id.clone(),
            session_id: machine.session().session_id.clone(),
        }]
    );
    let session = machine.session();
    assert_ne!(session.session_id, old_id);
    assert_eq!(session.step_index, 0);
    assert_eq!(session.role, None);
    assert!(session.questions.is_empty());
    assert!(session.answers.is_empty());
    assert_eq!(session.generation, GenerationState::Idle);
    assert_eq!(snapshot_rx.borrow().phase, Phase::RoleSelection);

    // A different role may be chosen after reset
    select(&mut machine, "expert");
    assert_eq!(machine.session().role, Some(Role::Expert));
}

#[test]
fn test_complete_survey() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "expert");

    let mut last_events = Vec::new();
    while machine.session().phase() == Phase::Asking {
        last_events = answer_and_advance(&mut machine);
    }

    assert_eq!(machine.session().step_index, 11);
    assert_eq!(machine.session().phase(), Phase::Complete);
    assert_eq!(machine.session().answers.len(), 10);
    assert_eq!(
        last_events,
        vec![
            SurveyEvent::StepChanged { from: 10, to: 11 },
            SurveyEvent::SurveyCompleted {
                role: Some(Role::Expert),
                answered: 10,
                total: 10,
            },
        ]
    );
    assert_eq!(snapshot_rx.borrow().progress(), 1.0);

    let err = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 9,
            answer: Answer::Score(5),
        })
        .unwrap_err();
    assert!(matches!(err, SurveyError::InvalidTransition { .. }));
    assert!(machine.apply(SurveyCommand::Advance).is_err());
    assert!(machine.apply(SurveyCommand::Retreat).is_err());

    let events = machine.apply(SurveyCommand::Reset).unwrap();
    assert!(matches!(events[0], SurveyEvent::SessionReset { .. }));
    assert_eq!(machine.session().phase(), Phase::RoleSelection);
}

#[test]
fn test_generation_gating() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "public");
    answer_and_advance(&mut machine);
    assert_eq!(machine.session().current_question().unwrap().key, "magic_canvas");

    // Empty prompt never starts a generation
    let events = begin(&mut machine, "  ");
    assert_eq!(
        events,
        vec![SurveyEvent::GenerationBlocked {
            question_index: 1,
            reason: BlockReason::EmptyPrompt
        }]
    );
    assert_eq!(machine.session().generation, GenerationState::Idle);

    // A judgment before any generation is rejected
    let judgment = Answer::Judgment(Judgment::SecondBetter);
    let events = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 1,
            answer: judgment.clone(),
        })
        .unwrap();
    assert_eq!(
        events[0].blocked_reason(),
        Some(BlockReason::GenerationIncomplete)
    );

    let ticket = begin(&mut machine, "turn my dog into a knight")
        .iter()
        .find_map(SurveyEvent::generation_ticket)
        .unwrap();
    assert!(machine.session().generation.is_pending());

    // While pending: no second generation, no navigation, no judgment
    let events = begin(&mut machine, "again");
    assert_eq!(events[0].blocked_reason(), Some(BlockReason::GenerationPending));
    let events = machine.apply(SurveyCommand::Advance).unwrap();
    assert_eq!(events[0].blocked_reason(), Some(BlockReason::GenerationPending));
    let events = machine.apply(SurveyCommand::Retreat).unwrap();
    assert_eq!(events[0].blocked_reason(), Some(BlockReason::GenerationPending));
    let events = machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 1,
            answer: judgment.clone(),
        })
        .unwrap();
    assert_eq!(events[0].blocked_reason(), Some(BlockReason::GenerationPending));
    assert_eq!(machine.session().step_index, 2);

    let events = machine
        .apply(SurveyCommand::FinishGeneration {
            ticket,
            result: Ok(sample_pair()),
        })
        .unwrap();
    assert_eq!(
        events,
        vec![SurveyEvent::GenerationCompleted {
            question_index: 1,
            ticket
        }]
    );
    assert!(machine.session().generation.is_ready());

    machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 1,
            answer: judgment.clone(),
        })
        .unwrap();
    assert_eq!(machine.session().answers.get(&1), Some(&judgment));
    assert_eq!(machine.session().generation, GenerationState::Idle);
}

#[test]
fn test_generation_failure_allows_retry() {
    let (mut machine, _rx, _temp) = create_test_machine(None);
    select(&mut machine, "expert");
    answer_and_advance(&mut machine);
    answer_and_advance(&mut machine);

    let ticket = begin(&mut machine, "seven-fingered hand")
        .iter()
        .find_map(SurveyEvent::generation_ticket)
        .unwrap();
    let events = machine
        .apply(SurveyCommand::FinishGeneration {
            ticket,
            result: Err(GenerationError::Timeout { seconds: 30 }),
        })
        .unwrap();

    assert!(matches!(events[0], SurveyEvent::GenerationFailed { .. }));
    match &machine.session().generation {
        GenerationState::Failed { prompt, error } => {
            assert_eq!(prompt, "seven-fingered hand");
            assert!(error.contains("timed out"));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }

    let events = begin(&mut machine, "seven-fingered hand, photo");
    let retry_ticket = events.iter().find_map(SurveyEvent::generation_ticket);
    assert!(retry_ticket.is_some_and(|t| t > ticket));
}

#[test]
fn test_stale_generation_result_is_discarded() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "designer");
    answer_and_advance(&mut machine);
    answer_and_advance(&mut machine);

    let ticket = begin(&mut machine, "poster for a jazz night")
        .iter()
        .find_map(SurveyEvent::generation_ticket)
        .unwrap();

    // Wrong ticket while pending
    let events = machine
        .apply(SurveyCommand::FinishGeneration {
            ticket: ticket + 7,
            result: Ok(sample_pair()),
        })
        .unwrap();
    assert_eq!(
        events,
        vec![SurveyEvent::GenerationDiscarded { ticket: ticket + 7 }]
    );
    assert!(machine.session().generation.is_pending());

    // Session reset while in flight
    machine.apply(SurveyCommand::Reset).unwrap();
    let events = machine
        .apply(SurveyCommand::FinishGeneration {
            ticket,
            result: Ok(sample_pair()),
        })
        .unwrap();
    assert_eq!(events, vec![SurveyEvent::GenerationDiscarded { ticket }]);
    assert_eq!(machine.session().generation, GenerationState::Idle);
    assert_eq!(snapshot_rx.borrow().phase, Phase::RoleSelection);
}

#[test]
fn test_generation_on_static_question_is_error() {
    let (mut machine, _rx, _temp) = create_test_machine(Some(10));
    select(&mut machine, "designer");

    let err = machine
        .apply(SurveyCommand::BeginGeneration {
            question_index: 0,
            prompt: "anything".into(),
        })
        .unwrap_err();
    assert_eq!(
        err,
        SurveyError::NotGenerative {
            question_key: "ab_anatomy".into()
        }
    );
}

#[test]
fn test_inconsistent_session_is_recovered() {
    let temp_dir = TempDir::new().unwrap();
    let mut broken = Session::new();
    broken.step_index = 3;
    broken.role = Some(Role::Designer);

    let (mut machine, snapshot_rx) =
        SurveyStateMachine::with_session(
            broken,
            default_catalog(Some(10)),
            create_logger(&temp_dir),
        );

    let events = machine.apply(SurveyCommand::Advance).unwrap();

    assert_eq!(events, vec![SurveyEvent::SessionRecovered { step_index: 3 }]);
    assert_eq!(machine.session().step_index, 0);
    assert_eq!(machine.session().role, None);
    assert_eq!(snapshot_rx.borrow().phase, Phase::RoleSelection);
}

#[test]
fn test_snapshot_progress_and_retreat_flag() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine(Some(10));
    assert_eq!(snapshot_rx.borrow().progress(), 0.0);
    assert!(!snapshot_rx.borrow().can_retreat());

    select(&mut machine, "designer");
    assert!(!snapshot_rx.borrow().can_retreat());
    answer_and_advance(&mut machine);

    let snapshot = snapshot_rx.borrow();
    assert!(snapshot.can_retreat());
    assert!((snapshot.progress() - 0.1).abs() < f64::EPSILON);
    assert_eq!(snapshot.answers_by_key.len(), 1);
    assert!(snapshot.answers_by_key.contains_key("ab_anatomy"));
}

#[test]
fn test_commands_and_events_are_logged() {
    let (mut machine, _rx, temp) = create_test_machine(Some(10));
    select(&mut machine, "public");
    let _ = machine.apply(SurveyCommand::Retreat);

    let content = std::fs::read_to_string(temp.path().join("logs").join("events.jsonl")).unwrap();
    assert!(content.contains("\"SelectRole\""));
    assert!(content.contains("\"RoleSelected\""));
    assert!(content.contains("\"Rejected\""));
}

#[test]
fn test_answer_values_stay_out_of_log() {
    let (mut machine, _rx, temp) = create_test_machine(Some(10));
    select(&mut machine, "public");
    machine
        .apply(SurveyCommand::RecordAnswer {
            question_index: 0,
            answer: Answer::Choice("Turn photos into anime".into()),
        })
        .expect("RecordAnswer should succeed");
    machine.apply(SurveyCommand::Advance).expect("Advance should succeed");

    let content = std::fs::read_to_string(temp.path().join("logs").join("events.jsonl")).unwrap();
    assert!(content.contains("\"AnswerRecorded\""));
    assert!(content.contains("\"answer_shape\":\"choice\""));
    assert!(!content.contains("Turn photos into anime"));
}

#[test]
fn test_log_entries_follow_survey_session() {
    let (mut machine, _rx, temp) = create_test_machine(Some(10));
    let first = machine.session().session_id.clone();
    select(&mut machine, "public");
    machine.apply(SurveyCommand::Reset).expect("Reset should succeed");
    let second = machine.session().session_id.clone();
    select(&mut machine, "public");

    let content = std::fs::read_to_string(temp.path().join("logs").join("events.jsonl")).unwrap();
    let sessions: Vec<String> = content
        .lines()
        .map(|line| serde_json::from_str::<crate::structured_logger::LogEntry>(line).unwrap())
        .filter_map(|entry| entry.survey_session_id)
        .collect();
    assert_eq!(sessions.first(), Some(&first));
    assert_eq!(sessions.last(), Some(&second));
    assert_ne!(first, second);
}
