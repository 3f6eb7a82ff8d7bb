//! Question bank: the ordered, immutable quiz items a room plays through.
//!
//! DESIGN
//! ======
//! The bank is loaded once at startup, validated, and shared by every room
//! behind an `Arc`. Files are parsed with `serde_yaml`, which also accepts
//! JSON documents, so either format works for `QUESTIONS_PATH`.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Built-in bank used when no `QUESTIONS_PATH` is configured.
const BUILTIN_QUESTIONS: &str = include_str!("default_questions.yaml");

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("failed to read question bank: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse question bank: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("question bank is empty")]
    Empty,
    #[error("question {index} has {count} options (need at least 2)")]
    TooFewOptions { index: usize, count: usize },
    #[error("question {index} marks option {correct} correct but has {count} options")]
    CorrectOutOfRange { index: usize, correct: usize, count: usize },
}

/// One multiple-choice item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub correct_option_index: usize,
}

impl Question {
    #[must_use]
    pub fn is_correct(&self, option_index: usize) -> bool {
        option_index == self.correct_option_index
    }
}

/// Validated, non-empty question sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BankDocument {
    Wrapped { questions: Vec<Question> },
    Bare(Vec<Question>),
}

// =============================================================================
// CONSTRUCTION
// =============================================================================

impl QuestionSet {
    /// Validate and wrap a list of questions.
    pub fn new(questions: Vec<Question>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }
        for (index, q) in questions.iter().enumerate() {
            let count = q.options.len();
            if count < 2 {
                return Err(QuizError::TooFewOptions { index, count });
            }
            if q.correct_option_index >= count {
                return Err(QuizError::CorrectOutOfRange { index, correct: q.correct_option_index, count });
            }
        }
        Ok(Self { questions })
    }

    /// Parse a bank from YAML or JSON text. Accepts either a bare list or a
    /// document with a top-level `questions` key.
    pub fn parse(text: &str) -> Result<Self, QuizError> {
        let questions = match serde_yaml::from_str::<BankDocument>(text)? {
            BankDocument::Wrapped { questions } | BankDocument::Bare(questions) => questions,
        };
        Self::new(questions)
    }

    pub fn from_path(path: &Path) -> Result<Self, QuizError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// The bank compiled into the binary.
    pub fn builtin() -> Result<Self, QuizError> {
        Self::parse(BUILTIN_QUESTIONS)
    }
}

// =============================================================================
// ACCESS
// =============================================================================

impl QuestionSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false for a constructed set; present for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

#[cfg(test)]
#[path = "quiz_test.rs"]
mod tests;
