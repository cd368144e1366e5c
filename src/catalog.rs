//! Question catalog: the static, per-role ordered question definitions.
//!
//! The catalog is loaded from the `catalog` section of the survey config and is
//! read-only afterwards. `Catalog::questions` is a pure lookup: the same role
//! always yields the same ordered sequence.

use crate::answer::Answer;
use crate::errors::SurveyError;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Respondent category selecting which question sequence is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "newbie")]
    Public,
    Designer,
    Expert,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Public, Role::Designer, Role::Expert];

    pub fn id(&self) -> &'static str {
        match self {
            Role::Public => "public",
            Role::Designer => "designer",
            Role::Expert => "expert",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Role {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" | "newbie" => Ok(Role::Public),
            "designer" => Ok(Role::Designer),
            "expert" => Ok(Role::Expert),
            _ => Err(SurveyError::UnknownRole {
                role_id: s.to_string(),
            }),
        }
    }
}

/// Question kind with its type-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    FreeText {
        #[serde(default)]
        multiline: bool,
    },
    SingleChoice {
        options: Vec<String>,
        /// Option that opens a free-text field when picked.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        write_in: Option<String>,
    },
    Scale {
        min: i32,
        max: i32,
        default: i32,
    },
    /// Two fixed reference images, described by their captions.
    StaticImageCompare {
        first: String,
        second: String,
    },
    GenerateAndCompare {
        #[serde(default)]
        allow_reference: bool,
    },
}

impl QuestionKind {
    pub fn name(&self) -> &'static str {
        match self {
            QuestionKind::FreeText { .. } => "free-text",
            QuestionKind::SingleChoice { .. } => "single-choice",
            QuestionKind::Scale { .. } => "scale",
            QuestionKind::StaticImageCompare { .. } => "static-image-compare",
            QuestionKind::GenerateAndCompare { .. } => "generate-and-compare",
        }
    }

    /// Answer shape this kind accepts.
    fn expected_shape(&self) -> &'static str {
        match self {
            QuestionKind::FreeText { .. } => "text",
            QuestionKind::SingleChoice { .. } => "choice",
            QuestionKind::Scale { .. } => "score",
            QuestionKind::StaticImageCompare { .. } | QuestionKind::GenerateAndCompare { .. } => {
                "judgment"
            }
        }
    }
}

/// Why an answer or an advance was refused. Never an error: the front end keeps
/// the confirm action ineffective and shows this reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    EmptyText,
    NoSelection,
    UnknownOption,
    ScoreOutOfRange,
    NoJudgment,
    EmptyPrompt,
    GenerationPending,
    GenerationIncomplete,
    Unanswered,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BlockReason::EmptyText => "please enter an answer",
            BlockReason::NoSelection => "please pick one of the options",
            BlockReason::UnknownOption => "that option is not offered for this question",
            BlockReason::ScoreOutOfRange => "the score is outside the allowed range",
            BlockReason::NoJudgment => "please choose which image is better",
            BlockReason::EmptyPrompt => "please enter a prompt first",
            BlockReason::GenerationPending => "images are still being generated",
            BlockReason::GenerationIncomplete => "generate the images before judging them",
            BlockReason::Unanswered => "this question needs an answer before continuing",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier, unique within a role's sequence.
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Optional questions may be advanced past without an answer.
    #[serde(default)]
    pub optional: bool,
    pub kind: QuestionKind,
}

impl Question {
    /// Checks an answer against this question's completion condition.
    ///
    /// Returns `Ok(None)` when the answer is acceptable, `Ok(Some(reason))` when
    /// it fails validation, and an error when its shape does not fit the kind.
    /// Generation readiness is checked by the state machine, not here.
    pub fn check_answer(&self, answer: &Answer) -> Result<Option<BlockReason>, SurveyError> {
        let reason = match (&self.kind, answer) {
            (QuestionKind::FreeText { .. }, Answer::Text(text)) => {
                text.trim().is_empty().then_some(BlockReason::EmptyText)
            }
            (QuestionKind::SingleChoice { options, .. }, Answer::Choice(choice)) => {
                (!options.iter().any(|o| o == choice)).then_some(BlockReason::UnknownOption)
            }
            (
                QuestionKind::SingleChoice { write_in, .. },
                Answer::ChoiceWithText { choice, text },
            ) => {
                if write_in.as_ref() != Some(choice) {
                    Some(BlockReason::UnknownOption)
                } else {
                    text.trim().is_empty().then_some(BlockReason::EmptyText)
                }
            }
            (QuestionKind::Scale { min, max, .. }, Answer::Score(score)) => {
                (score < min || score > max).then_some(BlockReason::ScoreOutOfRange)
            }
            (QuestionKind::StaticImageCompare { .. }, Answer::Judgment(_))
            | (QuestionKind::GenerateAndCompare { .. }, Answer::Judgment(_)) => None,
            (kind, answer) => {
                return Err(SurveyError::AnswerKindMismatch {
                    question_key: self.key.clone(),
                    expected: kind.expected_shape(),
                    got: answer.shape(),
                })
            }
        };
        Ok(reason)
    }

    pub fn is_generative(&self) -> bool {
        matches!(self.kind, QuestionKind::GenerateAndCompare { .. })
    }

    fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            bail!("Question '{}' has an empty key", self.title);
        }
        match &self.kind {
            QuestionKind::SingleChoice { options, write_in } => {
                if options.is_empty() {
                    bail!("Single-choice question '{}' has no options", self.key);
                }
                if let Some(write_in) = write_in {
                    if !options.contains(write_in) {
                        bail!(
                            "Single-choice question '{}' has write-in '{}' that is not an option",
                            self.key,
                            write_in
                        );
                    }
                }
                let mut seen = HashSet::new();
                for option in options {
                    if !seen.insert(option) {
                        bail!(
                            "Single-choice question '{}' lists option '{}' twice",
                            self.key,
                            option
                        );
                    }
                }
            }
            QuestionKind::Scale { min, max, default } => {
                if min >= max {
                    bail!(
                        "Scale question '{}' has min {} not below max {}",
                        self.key,
                        min,
                        max
                    );
                }
                if default < min || default > max {
                    bail!(
                        "Scale question '{}' has default {} outside {}..={}",
                        self.key,
                        default,
                        min,
                        max
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Per-role entry of the catalog config.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoleEntry {
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<Question>,
}

/// The `catalog` section of the survey config.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Pad shorter sequences with the filler question up to this length.
    #[serde(default)]
    pub pad_to: Option<usize>,
    pub filler: Question,
    pub roles: BTreeMap<Role, RoleEntry>,
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<()> {
        for role in Role::ALL {
            let Some(entry) = self.roles.get(&role) else {
                bail!("Catalog has no entry for role '{}'", role);
            };
            if entry.questions.is_empty() {
                bail!("Catalog role '{}' has no questions", role);
            }
            let mut keys = HashSet::new();
            for question in &entry.questions {
                question.validate()?;
                if !keys.insert(question.key.as_str()) {
                    bail!(
                        "Catalog role '{}' uses question key '{}' twice",
                        role,
                        question.key
                    );
                }
            }
        }
        self.filler.validate()?;
        if self.filler.is_generative() {
            bail!("The filler question cannot be generate-and-compare");
        }
        Ok(())
    }
}

/// Read-only question catalog shared by every session.
#[derive(Debug, Clone)]
pub struct Catalog {
    config: CatalogConfig,
}

impl Catalog {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns a copy of this catalog with a different padding target.
    pub fn with_pad_to(mut self, pad_to: Option<usize>) -> Self {
        self.config.pad_to = pad_to;
        self
    }

    pub fn pad_to(&self) -> Option<usize> {
        self.config.pad_to
    }

    pub fn role_entry(&self, role: Role) -> Option<&RoleEntry> {
        self.config.roles.get(&role)
    }

    /// Ordered question sequence for a role, padded with filler questions up to
    /// `pad_to` when configured. Never truncates.
    pub fn questions(&self, role: Role) -> Vec<Question> {
        let mut questions = self
            .config
            .roles
            .get(&role)
            .map(|entry| entry.questions.clone())
            .unwrap_or_default();

        if let Some(target) = self.config.pad_to {
            let mut n = 1;
            while questions.len() < target {
                let mut filler = self.config.filler.clone();
                filler.key = format!("{}_{}", self.config.filler.key, n);
                questions.push(filler);
                n += 1;
            }
        }
        questions
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
