//! Error types for the survey domain.
//!
//! `SurveyError` signals a state-consistency problem: a command arrived that the
//! current session state cannot accept. These indicate a front-end ordering bug
//! and are never shown to respondents as validation feedback. Validation
//! problems travel as events instead (see `SurveyEvent::AdvanceBlocked`).

use thiserror::Error;

/// Errors returned by `SurveyStateMachine::apply`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurveyError {
    #[error("unknown role '{role_id}' (expected one of: public, designer, expert)")]
    UnknownRole { role_id: String },

    #[error("a role is already selected for this session; reset before choosing again")]
    RoleAlreadySelected,

    #[error("invalid transition: {message}")]
    InvalidTransition { message: String },

    #[error("command targets question {got} but the current question is {expected}")]
    QuestionMismatch { expected: usize, got: usize },

    #[error("question '{question_key}' expects a {expected} answer, got {got}")]
    AnswerKindMismatch {
        question_key: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("question '{question_key}' does not generate images")]
    NotGenerative { question_key: String },
}

impl SurveyError {
    pub(crate) fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition {
            message: message.into(),
        }
    }
}

/// Failures surfaced by the image call adapter.
///
/// All variants are retryable by the respondent; none is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("a prompt is required before generating")]
    EmptyPrompt,

    #[error("generation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("generation backend failed: {message}")]
    Backend { message: String },

    #[error("backend returned an unreadable image: {message}")]
    InvalidImage { message: String },

    #[error("reference image could not be used: {message}")]
    ReferenceImage { message: String },
}

impl GenerationError {
    pub(crate) fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
