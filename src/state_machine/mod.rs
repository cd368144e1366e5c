//! Centralized state machine for survey session state.
//!
//! This module provides the ONLY place where session state changes.
//! The state machine owns the session, validates commands, emits events,
//! and broadcasts snapshots to subscribers via a watch channel.

mod commands;
mod events;
mod snapshot;

pub use commands::SurveyCommand;
pub use events::SurveyEvent;
pub use snapshot::StateSnapshot;

use crate::answer::Answer;
use crate::catalog::{BlockReason, Catalog, Role};
use crate::errors::{GenerationError, SurveyError};
use crate::generation::GeneratedPair;
use crate::state::{GenerationState, Phase, Session};
use crate::structured_logger::StructuredLogger;
use std::sync::Arc;
use tokio::sync::watch;

/// Owns one respondent's session, validates commands, emits events,
/// broadcasts snapshots.
pub struct SurveyStateMachine {
    session: Session,
    catalog: Arc<Catalog>,
    snapshot_tx: watch::Sender<StateSnapshot>,
    logger: Arc<StructuredLogger>,
    seq: u64,
    next_ticket: u64,
}

impl SurveyStateMachine {
    /// Creates a state machine with a fresh session.
    ///
    /// Returns the state machine and a watch receiver for state snapshots.
    pub fn new(
        catalog: Arc<Catalog>,
        logger: Arc<StructuredLogger>,
    ) -> (Self, watch::Receiver<StateSnapshot>) {
        Self::with_session(Session::new(), catalog, logger)
    }

    pub(crate) fn with_session(
        session: Session,
        catalog: Arc<Catalog>,
        logger: Arc<StructuredLogger>,
    ) -> (Self, watch::Receiver<StateSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(StateSnapshot::from(&session));
        logger.set_survey_session(&session.session_id);
        let machine = Self {
            session,
            catalog,
            snapshot_tx,
            logger,
            seq: 0,
            next_ticket: 1,
        };
        (machine, snapshot_rx)
    }

    /// All mutations go through this single method.
    ///
    /// Validation failures come back as `Ok` with a blocked/rejected event and
    /// leave the session untouched. `Err` means the command was not valid in
    /// the current state at all.
    pub fn apply(&mut self, command: SurveyCommand) -> Result<Vec<SurveyEvent>, SurveyError> {
        self.seq += 1;
        self.logger.log_command(self.seq, &command);

        let result = if self.session.is_inconsistent() {
            Ok(self.recover())
        } else {
            self.apply_internal(command)
        };

        match &result {
            Ok(events) => {
                for event in events {
                    self.logger.log_event(self.seq, event);
                }
            }
            Err(error) => {
                tracing::warn!(seq = self.seq, %error, "Survey command rejected");
                self.logger.log_rejection(self.seq, error);
            }
        }

        self.broadcast_snapshot();
        result
    }

    fn apply_internal(&mut self, command: SurveyCommand) -> Result<Vec<SurveyEvent>, SurveyError> {
        match command {
            SurveyCommand::SelectRole { role_id } => self.select_role(&role_id),
            SurveyCommand::RecordAnswer {
                question_index,
                answer,
            } => self.record_answer(question_index, answer),
            SurveyCommand::Advance => self.advance(),
            SurveyCommand::Retreat => self.retreat(),
            SurveyCommand::Reset => Ok(self.reset()),
            SurveyCommand::BeginGeneration {
                question_index,
                prompt,
            } => self.begin_generation(question_index, prompt),
            SurveyCommand::FinishGeneration { ticket, result } => {
                Ok(self.finish_generation(ticket, result))
            }
        }
    }

    fn select_role(&mut self, role_id: &str) -> Result<Vec<SurveyEvent>, SurveyError> {
        if self.session.step_index != 0 {
            return Err(SurveyError::RoleAlreadySelected);
        }
        let role: Role = role_id.parse()?;
        let questions = self.catalog.questions(role);
        if questions.is_empty() {
            return Err(SurveyError::invalid_transition(format!(
                "catalog has no questions for role '{}'",
                role
            )));
        }

        let question_count = questions.len();
        self.session.role = Some(role);
        self.session.questions = questions;
        self.session.step_index = 1;
        tracing::info!(%role, question_count, "Role selected");

        Ok(vec![
            SurveyEvent::RoleSelected {
                role,
                question_count,
            },
            SurveyEvent::StepChanged { from: 0, to: 1 },
        ])
    }

    fn record_answer(
        &mut self,
        question_index: usize,
        answer: Answer,
    ) -> Result<Vec<SurveyEvent>, SurveyError> {
        let current = self.require_current(question_index, "record an answer")?;
        let question = &self.session.questions[current];

        let mut reason = question.check_answer(&answer)?;
        if reason.is_none() && question.is_generative() {
            reason = match &self.session.generation {
                GenerationState::Ready { .. } => None,
                GenerationState::Pending { .. } => Some(BlockReason::GenerationPending),
                _ => Some(BlockReason::GenerationIncomplete),
            };
        }
        if let Some(reason) = reason {
            return Ok(vec![SurveyEvent::AnswerRejected {
                question_index: current,
                reason,
            }]);
        }

        let question_key = question.key.clone();
        if question.is_generative() {
            self.session.generation = GenerationState::Idle;
        }
        let answer_shape = answer.shape();
        self.session.answers.insert(current, answer);

        Ok(vec![SurveyEvent::AnswerRecorded {
            question_index: current,
            question_key,
            answer_shape,
        }])
    }

    fn advance(&mut self) -> Result<Vec<SurveyEvent>, SurveyError> {
        let current = self.require_asking("advance")?;
        let question = &self.session.questions[current];

        let blocked = if self.session.generation.is_pending() {
            Some(BlockReason::GenerationPending)
        } else if !question.optional && !self.session.answers.contains_key(&current) {
            Some(BlockReason::Unanswered)
        } else {
            None
        };
        if let Some(reason) = blocked {
            return Ok(vec![SurveyEvent::AdvanceBlocked {
                question_index: current,
                reason,
            }]);
        }

        let from = self.session.step_index;
        self.session.step_index += 1;
        self.session.generation = GenerationState::Idle;
        let mut events = vec![SurveyEvent::StepChanged {
            from,
            to: self.session.step_index,
        }];

        if self.session.phase() == Phase::Complete {
            let answered = self.session.answers.len();
            let total = self.session.total_questions();
            let elapsed_secs = (chrono::Utc::now() - self.session.started_at).num_seconds();
            tracing::info!(answered, total, elapsed_secs, "Survey completed");
            events.push(SurveyEvent::SurveyCompleted {
                role: self.session.role,
                answered,
                total,
            });
        }
        Ok(events)
    }

    fn retreat(&mut self) -> Result<Vec<SurveyEvent>, SurveyError> {
        let current = self.require_asking("retreat")?;
        if self.session.step_index <= 1 {
            return Err(SurveyError::invalid_transition(
                "cannot retreat from the first question",
            ));
        }
        if self.session.generation.is_pending() {
            return Ok(vec![SurveyEvent::RetreatBlocked {
                question_index: current,
                reason: BlockReason::GenerationPending,
            }]);
        }

        let from = self.session.step_index;
        self.session.step_index -= 1;
        self.session.generation = GenerationState::Idle;
        Ok(vec![SurveyEvent::StepChanged {
            from,
            to: self.session.step_index,
        }])
    }

    fn reset(&mut self) -> Vec<SurveyEvent> {
        let previous_session_id = self.session.session_id.clone();
        self.start_new_run();
        tracing::info!(%previous_session_id, "Session reset");
        vec![SurveyEvent::SessionReset {
            previous_session_id,
            session_id: self.session.session_id.clone(),
        }]
    }

    fn recover(&mut self) -> Vec<SurveyEvent> {
        let step_index = self.session.step_index;
        tracing::warn!(
            step_index,
            "Session has no questions past role selection; forcing reset"
        );
        self.start_new_run();
        vec![SurveyEvent::SessionRecovered { step_index }]
    }

    fn start_new_run(&mut self) {
        self.session.reset();
        self.logger.increment_run_id();
        self.logger.set_survey_session(&self.session.session_id);
    }

    fn begin_generation(
        &mut self,
        question_index: usize,
        prompt: String,
    ) -> Result<Vec<SurveyEvent>, SurveyError> {
        let current = self.require_current(question_index, "generate images")?;
        let question = &self.session.questions[current];
        if !question.is_generative() {
            return Err(SurveyError::NotGenerative {
                question_key: question.key.clone(),
            });
        }

        let blocked = if self.session.generation.is_pending() {
            Some(BlockReason::GenerationPending)
        } else if prompt.trim().is_empty() {
            Some(BlockReason::EmptyPrompt)
        } else {
            None
        };
        if let Some(reason) = blocked {
            return Ok(vec![SurveyEvent::GenerationBlocked {
                question_index: current,
                reason,
            }]);
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.session.generation = GenerationState::Pending { ticket, prompt };
        Ok(vec![SurveyEvent::GenerationStarted {
            question_index: current,
            ticket,
        }])
    }

    fn finish_generation(
        &mut self,
        ticket: u64,
        result: Result<GeneratedPair, GenerationError>,
    ) -> Vec<SurveyEvent> {
        let prompt = match (&self.session.generation, self.session.current_index()) {
            (
                GenerationState::Pending {
                    ticket: pending,
                    prompt,
                },
                Some(_),
            ) if *pending == ticket => prompt.clone(),
            _ => {
                tracing::debug!(ticket, "Discarding stale generation result");
                return vec![SurveyEvent::GenerationDiscarded { ticket }];
            }
        };
        let question_index = self.session.step_index - 1;

        match result {
            Ok(pair) => {
                self.session.generation = GenerationState::Ready {
                    prompt,
                    pair: Arc::new(pair),
                };
                vec![SurveyEvent::GenerationCompleted {
                    question_index,
                    ticket,
                }]
            }
            Err(error) => {
                tracing::warn!(ticket, %error, "Generation failed");
                let error = error.to_string();
                self.session.generation = GenerationState::Failed {
                    prompt,
                    error: error.clone(),
                };
                vec![SurveyEvent::GenerationFailed {
                    question_index,
                    ticket,
                    error,
                }]
            }
        }
    }

    /// Index of the current question, or an error outside the asking phase.
    fn require_asking(&self, action: &str) -> Result<usize, SurveyError> {
        self.session.current_index().ok_or_else(|| {
            SurveyError::invalid_transition(format!(
                "cannot {} during {:?}",
                action,
                self.session.phase()
            ))
        })
    }

    fn require_current(&self, question_index: usize, action: &str) -> Result<usize, SurveyError> {
        let current = self.require_asking(action)?;
        if question_index != current {
            return Err(SurveyError::QuestionMismatch {
                expected: current,
                got: question_index,
            });
        }
        Ok(current)
    }

    /// Returns immutable reference to the current session.
    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Broadcasts the current state snapshot to all watchers.
    pub fn broadcast_snapshot(&self) {
        let snapshot = StateSnapshot::from(&self.session);
        let _ = self.snapshot_tx.send(snapshot);
    }
}

#[cfg(test)]
mod tests;
