//! Per-kind question input state and completion readiness.
//!
//! A `QuestionDraft` holds what the respondent has typed or picked for the
//! current question. Front ends draw it and edit it; `readiness` decides what
//! the confirm action may do. The state machine re-checks every gate on its own.

use crate::answer::{Answer, Judgment};
use crate::catalog::{BlockReason, Question, QuestionKind};
use crate::errors::GenerationError;
use crate::generation::GenerationRequest;
use crate::state::GenerationState;
use crate::state_machine::SurveyCommand;

/// Which field of a generate-and-compare question receives input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateFocus {
    Prompt,
    Reference,
    Judgment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionDraft {
    FreeText {
        text: String,
    },
    SingleChoice {
        cursor: usize,
        selected: Option<usize>,
        /// Text for the write-in option; `Some` while that option is picked.
        write_in: Option<String>,
    },
    Scale {
        value: i32,
    },
    StaticCompare {
        cursor: usize,
        judgment: Option<Judgment>,
    },
    GenerateCompare {
        prompt: String,
        reference_path: String,
        focus: GenerateFocus,
        cursor: usize,
        judgment: Option<Judgment>,
    },
}

/// Outcome of the confirm action for the current draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Record this answer, then advance
    Ready(Answer),
    /// Optional question left empty: advance without recording
    Skippable,
    /// Confirm does nothing; show the reason
    Blocked(BlockReason),
}

impl Readiness {
    /// Commands the confirm action sends for the question at `question_index`.
    pub fn commands(self, question_index: usize) -> Result<Vec<SurveyCommand>, BlockReason> {
        match self {
            Readiness::Ready(answer) => Ok(vec![
                SurveyCommand::RecordAnswer {
                    question_index,
                    answer,
                },
                SurveyCommand::Advance,
            ]),
            Readiness::Skippable => Ok(vec![SurveyCommand::Advance]),
            Readiness::Blocked(reason) => Err(reason),
        }
    }
}

fn judgment_index(judgment: Judgment) -> usize {
    Judgment::ALL
        .iter()
        .position(|j| *j == judgment)
        .unwrap_or_default()
}

impl QuestionDraft {
    /// Empty input for a question. Scales start at their default value.
    pub fn for_question(question: &Question) -> Self {
        match &question.kind {
            QuestionKind::FreeText { .. } => QuestionDraft::FreeText {
                text: String::new(),
            },
            QuestionKind::SingleChoice { .. } => QuestionDraft::SingleChoice {
                cursor: 0,
                selected: None,
                write_in: None,
            },
            QuestionKind::Scale { default, .. } => QuestionDraft::Scale { value: *default },
            QuestionKind::StaticImageCompare { .. } => QuestionDraft::StaticCompare {
                cursor: 0,
                judgment: None,
            },
            QuestionKind::GenerateAndCompare { .. } => QuestionDraft::GenerateCompare {
                prompt: String::new(),
                reference_path: String::new(),
                focus: GenerateFocus::Prompt,
                cursor: 0,
                judgment: None,
            },
        }
    }

    /// Input pre-filled from a previously recorded answer (after a retreat).
    ///
    /// Generate-and-compare questions start over: their images are not kept.
    pub fn from_answer(question: &Question, answer: &Answer) -> Self {
        let mut draft = Self::for_question(question);
        match (&mut draft, &question.kind, answer) {
            (QuestionDraft::FreeText { text }, _, Answer::Text(recorded)) => {
                text.clone_from(recorded);
            }
            (
                QuestionDraft::SingleChoice {
                    cursor,
                    selected,
                    write_in,
                },
                QuestionKind::SingleChoice { options, .. },
                Answer::Choice(choice) | Answer::ChoiceWithText { choice, .. },
            ) => {
                if let Some(index) = options.iter().position(|o| o == choice) {
                    *cursor = index;
                    *selected = Some(index);
                }
                if let Answer::ChoiceWithText { text, .. } = answer {
                    *write_in = Some(text.clone());
                }
            }
            (QuestionDraft::Scale { value }, _, Answer::Score(score)) => *value = *score,
            (QuestionDraft::StaticCompare { cursor, judgment }, _, Answer::Judgment(recorded)) => {
                *cursor = judgment_index(*recorded);
                *judgment = Some(*recorded);
            }
            _ => {}
        }
        draft
    }

    /// True when typed characters go into a text field.
    ///
    /// A write-in field only takes text while the cursor rests on its option.
    pub fn accepts_text(&self) -> bool {
        match self {
            QuestionDraft::FreeText { .. } => true,
            QuestionDraft::SingleChoice {
                cursor,
                selected,
                write_in,
            } => write_in.is_some() && *selected == Some(*cursor),
            QuestionDraft::GenerateCompare { focus, .. } => *focus != GenerateFocus::Judgment,
            _ => false,
        }
    }

    pub fn insert_str(&mut self, input: &str) {
        match self {
            QuestionDraft::FreeText { text } => text.push_str(input),
            QuestionDraft::SingleChoice {
                write_in: Some(text),
                ..
            } => text.extend(input.chars().filter(|c| *c != '\n')),
            QuestionDraft::GenerateCompare {
                prompt,
                reference_path,
                focus,
                ..
            } => match focus {
                // Prompts and paths are single-line
                GenerateFocus::Prompt => prompt.extend(input.chars().filter(|c| *c != '\n')),
                GenerateFocus::Reference => {
                    reference_path.extend(input.chars().filter(|c| *c != '\n'))
                }
                GenerateFocus::Judgment => {}
            },
            _ => {}
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.insert_str(c.encode_utf8(&mut buf));
    }

    /// Inserts a line break, for multi-line free-text questions only.
    pub fn newline(&mut self, question: &Question) {
        if let (QuestionDraft::FreeText { text }, QuestionKind::FreeText { multiline: true }) =
            (self, &question.kind)
        {
            text.push('\n');
        }
    }

    pub fn backspace(&mut self) {
        match self {
            QuestionDraft::FreeText { text }
            | QuestionDraft::SingleChoice {
                write_in: Some(text),
                ..
            } => {
                text.pop();
            }
            QuestionDraft::GenerateCompare {
                prompt,
                reference_path,
                focus,
                ..
            } => match focus {
                GenerateFocus::Prompt => {
                    prompt.pop();
                }
                GenerateFocus::Reference => {
                    reference_path.pop();
                }
                GenerateFocus::Judgment => {}
            },
            _ => {}
        }
    }

    /// Moves the option cursor, or nudges a scale value, by `delta`.
    pub fn move_cursor(&mut self, question: &Question, delta: i32) {
        match (self, &question.kind) {
            (
                QuestionDraft::SingleChoice { cursor, .. },
                QuestionKind::SingleChoice { options, .. },
            ) => {
                *cursor = step(*cursor, delta, options.len());
            }
            (QuestionDraft::Scale { value }, QuestionKind::Scale { min, max, .. }) => {
                *value = value.saturating_add(delta).clamp(*min, *max);
            }
            (QuestionDraft::StaticCompare { cursor, .. }, _) => {
                *cursor = step(*cursor, delta, Judgment::ALL.len());
            }
            (QuestionDraft::GenerateCompare { cursor, focus, .. }, _)
                if *focus == GenerateFocus::Judgment =>
            {
                *cursor = step(*cursor, delta, Judgment::ALL.len());
            }
            _ => {}
        }
    }

    /// Selects the option under the cursor. Picking the write-in option opens
    /// its text field; picking any other option closes it.
    pub fn select_cursor(&mut self, question: &Question) {
        match (self, &question.kind) {
            (
                QuestionDraft::SingleChoice {
                    cursor,
                    selected,
                    write_in,
                },
                QuestionKind::SingleChoice {
                    options,
                    write_in: write_in_option,
                },
            ) if *cursor < options.len() => {
                *selected = Some(*cursor);
                *write_in = if write_in_option.as_ref() == options.get(*cursor) {
                    Some(write_in.take().unwrap_or_default())
                } else {
                    None
                };
            }
            (QuestionDraft::StaticCompare { cursor, judgment }, _) => {
                *judgment = Judgment::ALL.get(*cursor).copied();
            }
            (
                QuestionDraft::GenerateCompare {
                    cursor,
                    judgment,
                    focus,
                    ..
                },
                _,
            ) if *focus == GenerateFocus::Judgment => {
                *judgment = Judgment::ALL.get(*cursor).copied();
            }
            _ => {}
        }
    }

    /// Sets the answer directly (scripted input).
    pub fn set_judgment(&mut self, value: Judgment) {
        if let QuestionDraft::StaticCompare { cursor, judgment }
        | QuestionDraft::GenerateCompare {
            cursor, judgment, ..
        } = self
        {
            *cursor = judgment_index(value);
            *judgment = Some(value);
        }
    }

    /// Cycles focus between prompt, reference path (when allowed) and judgment.
    pub fn cycle_focus(&mut self, question: &Question) {
        let allow_reference = matches!(
            question.kind,
            QuestionKind::GenerateAndCompare {
                allow_reference: true
            }
        );
        if let QuestionDraft::GenerateCompare { focus, .. } = self {
            *focus = match *focus {
                GenerateFocus::Prompt if allow_reference => GenerateFocus::Reference,
                GenerateFocus::Prompt | GenerateFocus::Reference => GenerateFocus::Judgment,
                GenerateFocus::Judgment => GenerateFocus::Prompt,
            };
        }
    }

    pub fn focus(&self) -> Option<GenerateFocus> {
        match self {
            QuestionDraft::GenerateCompare { focus, .. } => Some(*focus),
            _ => None,
        }
    }

    /// Moves focus to the judgment choices once images are ready.
    pub fn focus_judgment(&mut self) {
        if let QuestionDraft::GenerateCompare { focus, .. } = self {
            *focus = GenerateFocus::Judgment;
        }
    }

    #[cfg(test)]
    pub fn prompt(&self) -> Option<&str> {
        match self {
            QuestionDraft::GenerateCompare { prompt, .. } => Some(prompt),
            _ => None,
        }
    }

    /// Builds the generation request for a generate-and-compare draft.
    ///
    /// The reference path is ignored when the question does not allow one.
    pub fn generation_request(
        &self,
        question: &Question,
    ) -> Option<Result<GenerationRequest, GenerationError>> {
        let QuestionDraft::GenerateCompare {
            prompt,
            reference_path,
            ..
        } = self
        else {
            return None;
        };
        let request = GenerationRequest::new(prompt.trim());
        Some(match question.kind {
            QuestionKind::GenerateAndCompare {
                allow_reference: true,
            } => request.with_reference_path(reference_path),
            _ => Ok(request),
        })
    }

    /// Decides what confirm does for this draft.
    pub fn readiness(&self, question: &Question, generation: &GenerationState) -> Readiness {
        let empty = |reason| {
            if question.optional {
                Readiness::Skippable
            } else {
                Readiness::Blocked(reason)
            }
        };

        match (self, &question.kind) {
            (QuestionDraft::FreeText { text }, QuestionKind::FreeText { .. }) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    empty(BlockReason::EmptyText)
                } else {
                    Readiness::Ready(Answer::Text(trimmed.to_string()))
                }
            }
            (
                QuestionDraft::SingleChoice {
                    selected, write_in, ..
                },
                QuestionKind::SingleChoice { options, .. },
            ) => {
                let typed = write_in.as_deref().map(str::trim).unwrap_or_default();
                match selected.and_then(|i| options.get(i)) {
                    Some(option) if !typed.is_empty() => Readiness::Ready(Answer::ChoiceWithText {
                        choice: option.clone(),
                        text: typed.to_string(),
                    }),
                    Some(option) => Readiness::Ready(Answer::Choice(option.clone())),
                    None => empty(BlockReason::NoSelection),
                }
            }
            (QuestionDraft::Scale { value }, QuestionKind::Scale { min, max, .. }) => {
                if value < min || value > max {
                    Readiness::Blocked(BlockReason::ScoreOutOfRange)
                } else {
                    Readiness::Ready(Answer::Score(*value))
                }
            }
            (
                QuestionDraft::StaticCompare { judgment, .. },
                QuestionKind::StaticImageCompare { .. },
            ) => match judgment {
                Some(judgment) => Readiness::Ready(Answer::Judgment(*judgment)),
                None => empty(BlockReason::NoJudgment),
            },
            (
                QuestionDraft::GenerateCompare {
                    prompt, judgment, ..
                },
                QuestionKind::GenerateAndCompare { .. },
            ) => {
                if generation.is_pending() {
                    Readiness::Blocked(BlockReason::GenerationPending)
                } else if prompt.trim().is_empty() && !generation.is_ready() {
                    empty(BlockReason::EmptyPrompt)
                } else if !generation.is_ready() {
                    Readiness::Blocked(BlockReason::GenerationIncomplete)
                } else {
                    match judgment {
                        Some(judgment) => Readiness::Ready(Answer::Judgment(*judgment)),
                        None => Readiness::Blocked(BlockReason::NoJudgment),
                    }
                }
            }
            _ => Readiness::Blocked(BlockReason::Unanswered),
        }
    }
}

fn step(cursor: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let moved = cursor as i64 + i64::from(delta);
    moved.clamp(0, len as i64 - 1) as usize
}

#[cfg(test)]
#[path = "tests/renderer_tests.rs"]
mod tests;
