//! Read-only snapshot of survey state for display.
//!
//! Front ends NEVER mutate this; they receive new snapshots via the watch channel.

use crate::answer::Answer;
use crate::catalog::{Question, Role};
use crate::state::{GenerationState, Phase, Session};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub session_id: String,
    pub phase: Phase,
    pub role: Option<Role>,
    pub step_index: usize,
    pub total_questions: usize,
    /// The question being asked, if in the asking phase
    pub current_question: Option<Question>,
    /// Previously recorded answer for the current question (after a retreat)
    pub current_answer: Option<Answer>,
    pub answers: BTreeMap<usize, Answer>,
    pub answers_by_key: BTreeMap<String, Answer>,
    pub generation: GenerationState,
}

impl StateSnapshot {
    /// Fraction of questions already passed, 0.0..=1.0.
    pub fn progress(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        let passed = self.step_index.saturating_sub(1).min(self.total_questions);
        passed as f64 / self.total_questions as f64
    }

    /// Retreat is offered for questions 2..=N only.
    pub fn can_retreat(&self) -> bool {
        self.phase == Phase::Asking && self.step_index > 1 && !self.generation.is_pending()
    }
}

impl From<&Session> for StateSnapshot {
    fn from(session: &Session) -> Self {
        let current_index = session.current_index();
        Self {
            session_id: session.session_id.clone(),
            phase: session.phase(),
            role: session.role,
            step_index: session.step_index,
            total_questions: session.total_questions(),
            current_question: session.current_question().cloned(),
            current_answer: current_index.and_then(|i| session.answers.get(&i).cloned()),
            answers: session.answers.clone(),
            answers_by_key: session.answers_by_key(),
            generation: session.generation.clone(),
        }
    }
}
