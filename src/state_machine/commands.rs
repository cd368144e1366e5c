//! Commands that can mutate survey state.
//!
//! All state changes MUST go through the state machine's `apply()` method.

use crate::answer::Answer;
use crate::errors::GenerationError;
use crate::generation::GeneratedPair;
use serde_json::{json, Value};

/// Commands that can mutate survey state.
#[derive(Debug, Clone)]
pub enum SurveyCommand {
    /// Bind the role's question sequence and move to the first question
    SelectRole { role_id: String },
    /// Store an answer for the current question (does not advance)
    RecordAnswer { question_index: usize, answer: Answer },
    /// Move to the next question, or to completion after the last one
    Advance,
    /// Move back one question
    Retreat,
    /// Discard the session and start over
    Reset,
    /// Mark a generation as in flight for the current generate-and-compare question
    BeginGeneration { question_index: usize, prompt: String },
    /// Deliver the outcome of the generation identified by `ticket`
    FinishGeneration {
        ticket: u64,
        result: Result<GeneratedPair, GenerationError>,
    },
}

impl SurveyCommand {
    /// JSON form for the structured log. Answers, prompts and image bytes are
    /// summarized, never logged.
    pub fn log_value(&self) -> Value {
        match self {
            SurveyCommand::SelectRole { role_id } => {
                json!({"command": "SelectRole", "role_id": role_id})
            }
            SurveyCommand::RecordAnswer {
                question_index,
                answer,
            } => json!({
                "command": "RecordAnswer",
                "question_index": question_index,
                "answer_shape": answer.shape(),
                "answer_chars": answer.to_string().chars().count(),
            }),
            SurveyCommand::Advance => json!({"command": "Advance"}),
            SurveyCommand::Retreat => json!({"command": "Retreat"}),
            SurveyCommand::Reset => json!({"command": "Reset"}),
            SurveyCommand::BeginGeneration {
                question_index,
                prompt,
            } => json!({
                "command": "BeginGeneration",
                "question_index": question_index,
                "prompt_chars": prompt.chars().count(),
            }),
            SurveyCommand::FinishGeneration { ticket, result } => match result {
                Ok(pair) => json!({
                    "command": "FinishGeneration",
                    "ticket": ticket,
                    "first_bytes": pair.first.bytes.len(),
                    "second_bytes": pair.second.bytes.len(),
                }),
                Err(error) => json!({
                    "command": "FinishGeneration",
                    "ticket": ticket,
                    "error": error.to_string(),
                }),
            },
        }
    }
}
