use crate::answer::Answer;
use crate::catalog::{Question, Role};
use crate::generation::GeneratedPair;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Key suffix for the text typed with a write-in option.
pub const WRITE_IN_SUFFIX: &str = "_custom";

/// Wizard phase, derived from the step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    RoleSelection,
    Asking,
    Complete,
}

/// Transient generation state of the current generate-and-compare question.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Pending {
        ticket: u64,
        prompt: String,
    },
    Ready {
        prompt: String,
        pair: Arc<GeneratedPair>,
    },
    Failed {
        prompt: String,
        error: String,
    },
}

impl GenerationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, GenerationState::Pending { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, GenerationState::Ready { .. })
    }
}

/// One respondent's run through the survey.
///
/// Only the state machine mutates a session; everything else reads snapshots.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub role: Option<Role>,
    /// 0 = role selection, 1..=N = questions, N+1 = complete.
    pub step_index: usize,
    pub questions: Vec<Question>,
    /// Answers keyed by zero-based question index.
    pub answers: BTreeMap<usize, Answer>,
    pub generation: GenerationState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            role: None,
            step_index: 0,
            questions: Vec::new(),
            answers: BTreeMap::new(),
            generation: GenerationState::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.step_index == 0 {
            Phase::RoleSelection
        } else if self.step_index <= self.questions.len() {
            Phase::Asking
        } else {
            Phase::Complete
        }
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Zero-based index of the question being asked, if any.
    pub fn current_index(&self) -> Option<usize> {
        (self.phase() == Phase::Asking).then(|| self.step_index - 1)
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_index().and_then(|i| self.questions.get(i))
    }

    /// True when the session claims to be past role selection but has no
    /// questions bound, e.g. after external state loss.
    pub fn is_inconsistent(&self) -> bool {
        self.step_index >= 1 && self.questions.is_empty()
    }

    /// Answers keyed by question key, for summaries and debug output.
    ///
    /// A write-in answer is split in two: the option under the question key
    /// and the typed text under `<key>_custom`.
    pub fn answers_by_key(&self) -> BTreeMap<String, Answer> {
        let mut by_key = BTreeMap::new();
        for (index, answer) in &self.answers {
            let Some(question) = self.questions.get(*index) else {
                continue;
            };
            match answer {
                Answer::ChoiceWithText { choice, text } => {
                    by_key.insert(question.key.clone(), Answer::Choice(choice.clone()));
                    by_key.insert(
                        format!("{}{}", question.key, WRITE_IN_SUFFIX),
                        Answer::Text(text.clone()),
                    );
                }
                _ => {
                    by_key.insert(question.key.clone(), answer.clone());
                }
            }
        }
        by_key
    }

    /// Clears everything back to a fresh session with a new id.
    pub fn reset(&mut self) {
        *self = Session::new();
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
