//! Scripted, non-interactive survey runs.
//!
//! A script is a YAML file naming a role and one entry per question, in order.
//! It drives the same state machine the terminal UI uses, so every gate
//! (required answers, generation before judging) applies unchanged.
//!
//! ```yaml
//! role: designer
//! answers:
//!   - a                      # static comparison: a, b, tie
//!   - b
//!   - prompt: "jazz night poster"
//!     judgment: a
//!   - Normal                 # single choice by label, or a 1-based number
//!   - choice: Something else # write-in option with its text
//!     text: "turn my sketches into comics"
//!   - 9                      # scale
//!   - ~                      # skip an optional question
//! ```

use crate::answer::{Answer, Judgment};
use crate::catalog::{Question, QuestionKind, Role};
use crate::generation::{GenerationRequest, GenerationService};
use crate::state::Phase;
use crate::state_machine::{StateSnapshot, SurveyCommand, SurveyEvent, SurveyStateMachine};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurveyScript {
    #[serde(default)]
    pub role: Option<String>,
    /// One entry per question; `null` skips an optional question.
    #[serde(default)]
    pub answers: Vec<Option<ScriptAnswer>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScriptAnswer {
    Generate {
        prompt: String,
        #[serde(default)]
        reference: Option<PathBuf>,
        judgment: String,
    },
    /// The write-in option of a single-choice question plus its text.
    WriteIn { choice: String, text: String },
    Number(i32),
    Text(String),
}

impl SurveyScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse script: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// What one script entry turns into for the current question.
#[derive(Debug, PartialEq, Eq)]
enum ScriptStep {
    Record(Answer),
    Generate {
        request: GenerationRequest,
        judgment: Judgment,
    },
    Skip,
}

fn parse_judgment(value: &str) -> Result<Judgment> {
    value.parse().map_err(|e: String| anyhow!(e))
}

fn script_step(question: &Question, entry: Option<&ScriptAnswer>) -> Result<ScriptStep> {
    let Some(entry) = entry else {
        if question.optional {
            return Ok(ScriptStep::Skip);
        }
        bail!("question is required and cannot be skipped");
    };

    let step = match (&question.kind, entry) {
        (QuestionKind::FreeText { .. }, ScriptAnswer::Text(text)) => {
            ScriptStep::Record(Answer::Text(text.clone()))
        }
        (QuestionKind::FreeText { .. }, ScriptAnswer::Number(n)) => {
            ScriptStep::Record(Answer::Text(n.to_string()))
        }
        (QuestionKind::SingleChoice { .. }, ScriptAnswer::Text(label)) => {
            ScriptStep::Record(Answer::Choice(label.clone()))
        }
        (QuestionKind::SingleChoice { .. }, ScriptAnswer::WriteIn { choice, text }) => {
            ScriptStep::Record(Answer::ChoiceWithText {
                choice: choice.clone(),
                text: text.clone(),
            })
        }
        (QuestionKind::SingleChoice { options, .. }, ScriptAnswer::Number(n)) => {
            let option = usize::try_from(*n)
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| options.get(i))
                .ok_or_else(|| anyhow!("option {} does not exist (1..={})", n, options.len()))?;
            ScriptStep::Record(Answer::Choice(option.clone()))
        }
        (QuestionKind::Scale { .. }, ScriptAnswer::Number(n)) => {
            ScriptStep::Record(Answer::Score(*n))
        }
        (QuestionKind::StaticImageCompare { .. }, ScriptAnswer::Text(value)) => {
            ScriptStep::Record(Answer::Judgment(parse_judgment(value)?))
        }
        (
            QuestionKind::GenerateAndCompare { allow_reference },
            ScriptAnswer::Generate {
                prompt,
                reference,
                judgment,
            },
        ) => {
            let mut request = GenerationRequest::new(prompt.trim());
            if let Some(path) = reference {
                if !allow_reference {
                    bail!("this question does not take a reference image");
                }
                let bytes = std::fs::read(path).with_context(|| {
                    format!("Failed to read reference image: {}", path.display())
                })?;
                request = request.with_reference(bytes);
            }
            ScriptStep::Generate {
                request,
                judgment: parse_judgment(judgment)?,
            }
        }
        (kind, entry) => bail!("{:?} does not fit a {} question", entry, kind.name()),
    };
    Ok(step)
}

/// Printed as JSON at the end of a scripted run.
#[derive(Debug, Clone, Serialize)]
pub struct HeadlessReport {
    pub session_id: String,
    pub role: Option<Role>,
    pub completed: bool,
    pub answered: usize,
    pub total: usize,
    pub answers: BTreeMap<String, Answer>,
}

impl From<&StateSnapshot> for HeadlessReport {
    fn from(snapshot: &StateSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id.clone(),
            role: snapshot.role,
            completed: snapshot.phase == Phase::Complete,
            answered: snapshot.answers.len(),
            total: snapshot.total_questions,
            answers: snapshot.answers_by_key.clone(),
        }
    }
}

/// Fails when the machine refused to move on.
fn ensure_applied(events: Vec<SurveyEvent>) -> Result<Vec<SurveyEvent>> {
    match events.iter().find_map(SurveyEvent::blocked_reason) {
        Some(reason) => bail!("{}", reason),
        None => Ok(events),
    }
}

pub struct HeadlessRunner<'a> {
    machine: SurveyStateMachine,
    snapshot_rx: watch::Receiver<StateSnapshot>,
    service: &'a GenerationService,
}

impl<'a> HeadlessRunner<'a> {
    pub fn new(
        machine: SurveyStateMachine,
        snapshot_rx: watch::Receiver<StateSnapshot>,
        service: &'a GenerationService,
    ) -> Self {
        Self {
            machine,
            snapshot_rx,
            service,
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Plays the script. `role_override` (from `--role`) wins over the
    /// script's own role. A script shorter than the survey leaves it incomplete.
    pub async fn run(
        mut self,
        script: &SurveyScript,
        role_override: Option<&str>,
    ) -> Result<HeadlessReport> {
        let role = role_override
            .or(script.role.as_deref())
            .context("No role given: set `role:` in the script or pass --role")?;
        self.machine.apply(SurveyCommand::SelectRole {
            role_id: role.to_string(),
        })?;

        for (n, entry) in script.answers.iter().enumerate() {
            let snapshot = self.snapshot();
            let Some(question) = snapshot.current_question.clone() else {
                bail!(
                    "Script has {} answers but the survey has only {} questions",
                    script.answers.len(),
                    snapshot.total_questions
                );
            };
            let question_index = snapshot.step_index - 1;
            self.answer(&snapshot.session_id, question_index, &question, entry.as_ref())
                .await
                .with_context(|| format!("Script answer {} ({})", n + 1, question.key))?;
        }

        let report = HeadlessReport::from(&self.snapshot());
        tracing::info!(
            completed = report.completed,
            answered = report.answered,
            "Scripted survey finished"
        );
        Ok(report)
    }

    async fn answer(
        &mut self,
        session_id: &str,
        question_index: usize,
        question: &Question,
        entry: Option<&ScriptAnswer>,
    ) -> Result<()> {
        let answer = match script_step(question, entry)? {
            ScriptStep::Skip => None,
            ScriptStep::Record(answer) => Some(answer),
            ScriptStep::Generate { request, judgment } => {
                self.generate(session_id, question_index, &question.key, request)
                    .await?;
                Some(Answer::Judgment(judgment))
            }
        };

        if let Some(answer) = answer {
            ensure_applied(self.machine.apply(SurveyCommand::RecordAnswer {
                question_index,
                answer,
            })?)?;
        }
        ensure_applied(self.machine.apply(SurveyCommand::Advance)?)?;
        Ok(())
    }

    async fn generate(
        &mut self,
        session_id: &str,
        question_index: usize,
        question_key: &str,
        request: GenerationRequest,
    ) -> Result<()> {
        let events = ensure_applied(self.machine.apply(SurveyCommand::BeginGeneration {
            question_index,
            prompt: request.prompt.clone(),
        })?)?;
        let ticket = events
            .iter()
            .find_map(SurveyEvent::generation_ticket)
            .context("Generation did not start")?;

        let started = Instant::now();
        let mut result = self.service.generate_pair(request).await;
        if let Ok(pair) = result.as_mut() {
            if let Err(e) = self.service.save_pair(session_id, question_key, pair) {
                tracing::warn!(error = %e, "Could not save generated images");
            }
        }
        tracing::debug!(
            ticket,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation returned"
        );

        let failure = result.as_ref().err().cloned();
        self.machine
            .apply(SurveyCommand::FinishGeneration { ticket, result })?;
        match failure {
            Some(error) => Err(error).context("Image generation failed"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "tests/headless_tests.rs"]
mod tests;
