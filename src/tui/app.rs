//! TUI-side survey state: the state machine plus what only the screen needs
//! (input draft, notices, cursor positions).

use crate::catalog::{BlockReason, Catalog, Role};
use crate::errors::GenerationError;
use crate::generation::{GeneratedPair, GenerationRequest};
use crate::renderer::{QuestionDraft, Readiness};
use crate::state_machine::{StateSnapshot, SurveyCommand, SurveyEvent, SurveyStateMachine};
use crate::structured_logger::StructuredLogger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    fn new(kind: NoticeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// A generation the runner must execute in the background.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub ticket: u64,
    pub session_id: String,
    pub question_key: String,
    pub request: GenerationRequest,
}

pub struct SurveyApp {
    machine: SurveyStateMachine,
    snapshot_rx: watch::Receiver<StateSnapshot>,
    logger: Arc<StructuredLogger>,
    /// Input for the current question; rebuilt whenever the step changes.
    pub draft: Option<QuestionDraft>,
    draft_for: Option<(String, usize)>,
    pub role_cursor: usize,
    pub notice: Option<Notice>,
    pub show_debug: bool,
    pub should_quit: bool,
    pub spinner_frame: usize,
}

impl SurveyApp {
    pub fn new(
        machine: SurveyStateMachine,
        snapshot_rx: watch::Receiver<StateSnapshot>,
        logger: Arc<StructuredLogger>,
        show_debug: bool,
    ) -> Self {
        let mut app = Self {
            machine,
            snapshot_rx,
            logger,
            draft: None,
            draft_for: None,
            role_cursor: 0,
            notice: None,
            show_debug,
            should_quit: false,
            spinner_frame: 0,
        };
        app.sync_draft();
        app
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn catalog(&self) -> &Catalog {
        self.machine.catalog()
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn tick(&mut self) {
        if self.snapshot_rx.borrow().generation.is_pending() {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
        }
    }

    /// Applies a command and turns the outcome into a notice for the screen.
    pub fn apply(&mut self, command: SurveyCommand) -> Vec<SurveyEvent> {
        let events = match self.machine.apply(command) {
            Ok(events) => events,
            Err(error) => {
                self.notice = Some(Notice::new(NoticeKind::Error, error.to_string()));
                Vec::new()
            }
        };
        for event in &events {
            self.note_event(event);
        }
        self.sync_draft();
        events
    }

    fn note_event(&mut self, event: &SurveyEvent) {
        if let Some(reason) = event.blocked_reason() {
            self.notice = Some(Notice::new(NoticeKind::Warning, reason.to_string()));
            return;
        }
        match event {
            SurveyEvent::StepChanged { .. } | SurveyEvent::GenerationCompleted { .. } => {
                self.notice = None;
            }
            SurveyEvent::GenerationFailed { error, .. } => {
                self.notice = Some(Notice::new(
                    NoticeKind::Error,
                    format!("{} (edit the prompt and try again)", error),
                ));
            }
            SurveyEvent::SessionRecovered { .. } => {
                self.notice = Some(Notice::new(
                    NoticeKind::Warning,
                    "The survey lost its questions and was restarted. \
                     Please choose your role again.",
                ));
            }
            SurveyEvent::SessionReset { .. } => {
                self.notice = Some(Notice::new(NoticeKind::Info, "Started a new survey"));
            }
            _ => {}
        }
    }

    /// Rebuilds the draft when the session or step changed.
    fn sync_draft(&mut self) {
        let snapshot = self.snapshot_rx.borrow();
        let key = (snapshot.session_id.clone(), snapshot.step_index);
        if self.draft_for.as_ref() == Some(&key) {
            return;
        }
        self.draft = snapshot.current_question.as_ref().map(|question| {
            match &snapshot.current_answer {
                Some(answer) => QuestionDraft::from_answer(question, answer),
                None => QuestionDraft::for_question(question),
            }
        });
        drop(snapshot);
        self.draft_for = Some(key);
    }

    pub fn move_role_cursor(&mut self, delta: i32) {
        let last = Role::ALL.len() - 1;
        self.role_cursor = if delta < 0 {
            self.role_cursor.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            (self.role_cursor + delta as usize).min(last)
        };
    }

    pub fn select_role(&mut self) {
        if let Some(role) = Role::ALL.get(self.role_cursor) {
            self.apply(SurveyCommand::SelectRole {
                role_id: role.id().to_string(),
            });
        }
    }

    /// The confirm action: record then advance when ready, skip when optional,
    /// otherwise explain what is missing.
    pub fn confirm(&mut self) {
        let snapshot = self.snapshot();
        let (Some(question), Some(draft)) = (&snapshot.current_question, &self.draft) else {
            return;
        };
        let question_index = snapshot.step_index - 1;

        // A generate-and-compare answer survives a retreat; with no new
        // prompt the recorded judgment stands
        let readiness = match draft.readiness(question, &snapshot.generation) {
            Readiness::Blocked(BlockReason::EmptyPrompt) if snapshot.current_answer.is_some() => {
                Readiness::Skippable
            }
            readiness => readiness,
        };

        match readiness.commands(question_index) {
            Ok(commands) => {
                for command in commands {
                    let events = self.apply(command);
                    if events.is_empty() || events.iter().any(|e| e.blocked_reason().is_some()) {
                        break;
                    }
                }
            }
            Err(reason) => {
                self.notice = Some(Notice::new(NoticeKind::Warning, reason.to_string()));
            }
        }
    }

    pub fn retreat(&mut self) {
        if self.snapshot_rx.borrow().can_retreat() {
            self.apply(SurveyCommand::Retreat);
        }
    }

    pub fn reset(&mut self) {
        self.role_cursor = 0;
        self.apply(SurveyCommand::Reset);
    }

    /// Starts a generation for the current question, if the draft allows it.
    /// An empty prompt on an already answered question confirms instead.
    pub fn begin_generation(&mut self) -> Option<GenerationJob> {
        let snapshot = self.snapshot();
        let question = snapshot.current_question.as_ref()?;
        let question_index = snapshot.step_index.checked_sub(1)?;

        let request = match self.draft.as_ref()?.generation_request(question)? {
            Ok(request) => request,
            Err(error) => {
                self.notice = Some(Notice::new(NoticeKind::Error, error.to_string()));
                return None;
            }
        };

        if request.prompt.is_empty() && snapshot.current_answer.is_some() {
            self.confirm();
            return None;
        }

        let events = self.apply(SurveyCommand::BeginGeneration {
            question_index,
            prompt: request.prompt.clone(),
        });
        let ticket = events.iter().find_map(SurveyEvent::generation_ticket)?;
        self.spinner_frame = 0;
        self.notice = Some(Notice::new(NoticeKind::Info, "Generating both images..."));

        Some(GenerationJob {
            ticket,
            session_id: snapshot.session_id.clone(),
            question_key: question.key.clone(),
            request,
        })
    }

    pub fn finish_generation(
        &mut self,
        ticket: u64,
        result: Result<GeneratedPair, GenerationError>,
        elapsed: Duration,
    ) {
        self.logger
            .log_generation(ticket, result.is_ok(), elapsed.as_millis());
        let events = self.apply(SurveyCommand::FinishGeneration { ticket, result });
        if events
            .iter()
            .any(|e| matches!(e, SurveyEvent::GenerationCompleted { .. }))
        {
            if let Some(draft) = self.draft.as_mut() {
                draft.focus_judgment();
            }
        }
    }

    pub fn paste(&mut self, text: &str) {
        if let Some(draft) = self.draft.as_mut() {
            draft.insert_str(text);
        }
    }
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
