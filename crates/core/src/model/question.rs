use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Problems that make a question (or a question set) unusable for grading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question set is empty")]
    EmptySet,

    #[error("question {0} appears more than once")]
    DuplicateId(QuestionId),

    #[error("question {0} has an empty stem")]
    EmptyStem(QuestionId),

    #[error("multiple-choice question {0} has no options")]
    NoOptions(QuestionId),

    #[error("multiple-choice question {id} marks option {index} correct but has {len} options")]
    CorrectIndexOutOfRange {
        id: QuestionId,
        index: usize,
        len: usize,
    },

    #[error("essay question {0} has no expected keywords")]
    NoKeywords(QuestionId),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Type-specific part of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    Mcq {
        options: Vec<String>,
        #[serde(rename = "correctIndex")]
        correct_index: usize,
    },
    Essay {
        #[serde(rename = "expectedKeywords")]
        expected_keywords: Vec<String>,
    },
}

/// One assessment item as delivered by the question source.
///
/// Questions are plain records; a session holds them behind a shared slice and
/// never mutates them once started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub stem: String,
    pub topic: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    #[must_use]
    pub fn mcq(
        id: QuestionId,
        stem: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        topic: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            id,
            kind: QuestionKind::Mcq {
                options,
                correct_index,
            },
            stem: stem.into(),
            topic: topic.into(),
            difficulty,
            explanation: String::new(),
        }
    }

    #[must_use]
    pub fn essay(
        id: QuestionId,
        stem: impl Into<String>,
        expected_keywords: Vec<String>,
        topic: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            id,
            kind: QuestionKind::Essay { expected_keywords },
            stem: stem.into(),
            topic: topic.into(),
            difficulty,
            explanation: String::new(),
        }
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    #[must_use]
    pub fn is_mcq(&self) -> bool {
        matches!(self.kind, QuestionKind::Mcq { .. })
    }

    #[must_use]
    pub fn is_essay(&self) -> bool {
        matches!(self.kind, QuestionKind::Essay { .. })
    }

    /// Check that the question can be answered and graded.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionError` found.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.stem.trim().is_empty() {
            return Err(QuestionError::EmptyStem(self.id));
        }
        match &self.kind {
            QuestionKind::Mcq {
                options,
                correct_index,
            } => {
                if options.is_empty() {
                    return Err(QuestionError::NoOptions(self.id));
                }
                if *correct_index >= options.len() {
                    return Err(QuestionError::CorrectIndexOutOfRange {
                        id: self.id,
                        index: *correct_index,
                        len: options.len(),
                    });
                }
            }
            QuestionKind::Essay { expected_keywords } => {
                if expected_keywords.iter().all(|k| k.trim().is_empty()) {
                    return Err(QuestionError::NoKeywords(self.id));
                }
            }
        }
        Ok(())
    }
}

/// Validate a full question set: non-empty, unique ids, every question well-formed.
///
/// # Errors
///
/// Returns the first `QuestionError` found.
pub fn validate_question_set(questions: &[Question]) -> Result<(), QuestionError> {
    if questions.is_empty() {
        return Err(QuestionError::EmptySet);
    }
    let mut seen = HashSet::with_capacity(questions.len());
    for question in questions {
        if !seen.insert(question.id) {
            return Err(QuestionError::DuplicateId(question.id));
        }
        question.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into(), "d".into()]
    }

    #[test]
    fn mcq_with_out_of_range_correct_index_is_rejected() {
        let q = Question::mcq(QuestionId::new(1), "Q", options(), 4, "t", Difficulty::Easy);
        assert_eq!(
            q.validate(),
            Err(QuestionError::CorrectIndexOutOfRange {
                id: QuestionId::new(1),
                index: 4,
                len: 4
            })
        );
    }

    #[test]
    fn essay_needs_keywords() {
        let q = Question::essay(QuestionId::new(2), "Q", vec![" ".into()], "t", Difficulty::Hard);
        assert_eq!(q.validate(), Err(QuestionError::NoKeywords(QuestionId::new(2))));
    }

    #[test]
    fn set_rejects_duplicates_and_empty() {
        assert_eq!(validate_question_set(&[]), Err(QuestionError::EmptySet));
        let q = Question::mcq(QuestionId::new(1), "Q", options(), 0, "t", Difficulty::Easy);
        assert_eq!(
            validate_question_set(&[q.clone(), q]),
            Err(QuestionError::DuplicateId(QuestionId::new(1)))
        );
    }

    #[test]
    fn deserializes_source_json() {
        let raw = r#"[
            {"id": 1, "type": "mcq", "stem": "2+2?", "options": ["3", "4"],
             "correctIndex": 1, "topic": "math", "difficulty": "easy",
             "explanation": "basic addition"},
            {"id": 2, "type": "essay", "stem": "Explain ownership",
             "expectedKeywords": ["borrow", "move", "drop"],
             "topic": "rust", "difficulty": "hard"}
        ]"#;
        let questions: Vec<Question> = serde_json::from_str(raw).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(
            questions[0].kind,
            QuestionKind::Mcq {
                options: vec!["3".into(), "4".into()],
                correct_index: 1
            }
        );
        assert!(questions[1].is_essay());
        assert_eq!(questions[1].explanation, "");
        assert!(validate_question_set(&questions).is_ok());
    }
}
