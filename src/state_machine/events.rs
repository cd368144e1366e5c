//! Events emitted by the state machine after processing commands.
//!
//! Front ends inspect them for feedback (blocked actions, generation tickets);
//! display state comes from `StateSnapshot` over the watch channel.

use crate::catalog::{BlockReason, Role};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SurveyEvent {
    /// A role was chosen and its question sequence bound
    RoleSelected { role: Role, question_count: usize },
    /// The step index moved
    StepChanged { from: usize, to: usize },
    /// An answer was stored for a question. Only its shape is carried so
    /// the value stays in memory.
    AnswerRecorded {
        question_index: usize,
        question_key: String,
        answer_shape: &'static str,
    },
    /// An answer failed the question's completion condition; nothing stored
    AnswerRejected {
        question_index: usize,
        reason: BlockReason,
    },
    /// Advance refused; state unchanged
    AdvanceBlocked {
        question_index: usize,
        reason: BlockReason,
    },
    /// Retreat refused; state unchanged
    RetreatBlocked {
        question_index: usize,
        reason: BlockReason,
    },
    /// Generation refused before calling the adapter
    GenerationBlocked {
        question_index: usize,
        reason: BlockReason,
    },
    /// Generation is in flight under this ticket
    GenerationStarted { question_index: usize, ticket: u64 },
    /// Both images arrived
    GenerationCompleted { question_index: usize, ticket: u64 },
    /// The adapter failed; the respondent may retry
    GenerationFailed {
        question_index: usize,
        ticket: u64,
        error: String,
    },
    /// A result arrived for a generation that is no longer pending
    GenerationDiscarded { ticket: u64 },
    /// The last question was advanced past
    SurveyCompleted {
        role: Option<Role>,
        answered: usize,
        total: usize,
    },
    /// The session was cleared on request
    SessionReset {
        previous_session_id: String,
        session_id: String,
    },
    /// The session was found inconsistent and force-reset; the command was not applied
    SessionRecovered { step_index: usize },
}

impl SurveyEvent {
    /// The reason carried by a blocked or rejected action, if this is one.
    pub fn blocked_reason(&self) -> Option<BlockReason> {
        match self {
            SurveyEvent::AnswerRejected { reason, .. }
            | SurveyEvent::AdvanceBlocked { reason, .. }
            | SurveyEvent::RetreatBlocked { reason, .. }
            | SurveyEvent::GenerationBlocked { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn generation_ticket(&self) -> Option<u64> {
        match self {
            SurveyEvent::GenerationStarted { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }
}
