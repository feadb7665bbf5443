use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;

/// A learner's answer to one question.
///
/// No correctness information lives here; an out-of-range `answer_index` is
/// stored as given and simply counts as unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Answer {
    Mcq {
        #[serde(rename = "answerIndex")]
        answer_index: Option<usize>,
    },
    Essay {
        #[serde(rename = "answerText")]
        answer_text: String,
    },
}

impl Answer {
    #[must_use]
    pub fn answer_index(&self) -> Option<usize> {
        match self {
            Answer::Mcq { answer_index } => *answer_index,
            Answer::Essay { .. } => None,
        }
    }

    #[must_use]
    pub fn answer_text(&self) -> Option<&str> {
        match self {
            Answer::Mcq { .. } => None,
            Answer::Essay { answer_text } => Some(answer_text),
        }
    }
}

/// Wire shape of one answer handed to a submission sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub answer_index: Option<usize>,
    pub answer_text: Option<String>,
}

/// Everything a submission sink receives for a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub answers: Vec<SubmittedAnswer>,
    pub time_spent_seconds: u64,
}
