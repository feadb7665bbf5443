use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::ids::QuestionId;
use crate::model::question::Difficulty;

//
// ─── BREAKDOWN ─────────────────────────────────────────────────────────────────
//

/// Correct-answer count for one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicScore {
    pub score: u32,
}

/// Correct-answer counts per difficulty bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DifficultyScores {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl DifficultyScores {
    pub(crate) fn bump(&mut self, difficulty: Difficulty) {
        let slot = match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        };
        *slot = slot.saturating_add(1);
    }
}

/// One incorrectly answered question, with what the learner should have said.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswer {
    pub question_id: QuestionId,
    pub question: String,
    pub correct_answer_description: String,
    pub explanation: String,
}

/// Graded outcome of a session.
///
/// Produced either by the local scoring engine or parsed from a server-graded
/// sink response, so the field names follow the wire format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub total_score_percent: f64,
    pub topics: BTreeMap<String, TopicScore>,
    pub difficulty: DifficultyScores,
    pub wrong_answers: Vec<WrongAnswer>,
    pub time_spent_seconds: u64,
}

//
// ─── PROFICIENCY ───────────────────────────────────────────────────────────────
//

/// Four ordinal proficiency bands, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProficiencyLevel {
    #[serde(rename = "Yếu")]
    Weak,
    #[serde(rename = "Trung bình")]
    Average,
    #[serde(rename = "Khá")]
    Good,
    #[serde(rename = "Giỏi")]
    Excellent,
}

impl ProficiencyLevel {
    pub const EXCELLENT_FROM: f64 = 85.0;
    pub const GOOD_FROM: f64 = 70.0;
    pub const AVERAGE_FROM: f64 = 50.0;

    /// Classify a total score percentage. Lower bounds are inclusive.
    #[must_use]
    pub fn from_score(score_percent: f64) -> Self {
        if score_percent >= Self::EXCELLENT_FROM {
            Self::Excellent
        } else if score_percent >= Self::GOOD_FROM {
            Self::Good
        } else if score_percent >= Self::AVERAGE_FROM {
            Self::Average
        } else {
            Self::Weak
        }
    }

    /// Learner-facing label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Weak => "Yếu",
            Self::Average => "Trung bình",
            Self::Good => "Khá",
            Self::Excellent => "Giỏi",
        }
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ─── REMEDIATION ───────────────────────────────────────────────────────────────
//

/// Study suggestion for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub topic: String,
    pub score: u32,
    pub message: String,
}

/// Immutable outcome of a submitted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub breakdown: ScoreBreakdown,
    pub level: ProficiencyLevel,
    pub recommendations: Vec<Recommendation>,
}
