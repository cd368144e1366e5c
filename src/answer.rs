//! Answer values recorded against survey questions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-way judgment for image comparison questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Judgment {
    FirstBetter,
    SecondBetter,
    #[serde(alias = "tie", alias = "unsure")]
    NoDifference,
}

impl Judgment {
    pub const ALL: [Judgment; 3] = [
        Judgment::FirstBetter,
        Judgment::SecondBetter,
        Judgment::NoDifference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::FirstBetter => "first-better",
            Judgment::SecondBetter => "second-better",
            Judgment::NoDifference => "no-difference",
        }
    }

    /// Short label for the choice buttons.
    pub fn label(&self) -> &'static str {
        match self {
            Judgment::FirstBetter => "Image A is better",
            Judgment::SecondBetter => "Image B is better",
            Judgment::NoDifference => "No difference",
        }
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Judgment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-better" | "first" | "a" => Ok(Judgment::FirstBetter),
            "second-better" | "second" | "b" => Ok(Judgment::SecondBetter),
            "no-difference" | "tie" | "unsure" => Ok(Judgment::NoDifference),
            other => Err(format!(
                "'{}' is not a judgment (use first-better, second-better or no-difference)",
                other
            )),
        }
    }
}

/// A recorded answer. The shape depends on the owning question's kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Choice(String),
    /// The write-in option of a single-choice question, with its text.
    ChoiceWithText { choice: String, text: String },
    Score(i32),
    Judgment(Judgment),
}

impl Answer {
    /// Name of the answer shape, used in mismatch errors and in logs.
    pub fn shape(&self) -> &'static str {
        match self {
            Answer::Text(_) => "text",
            Answer::Choice(_) | Answer::ChoiceWithText { .. } => "choice",
            Answer::Score(_) => "score",
            Answer::Judgment(_) => "judgment",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Text(text) | Answer::Choice(text) => f.write_str(text),
            Answer::ChoiceWithText { choice, text } => write!(f, "{}: {}", choice, text),
            Answer::Score(score) => write!(f, "{}", score),
            Answer::Judgment(judgment) => write!(f, "{}", judgment),
        }
    }
}
