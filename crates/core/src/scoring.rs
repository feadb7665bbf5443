//! Local grading of a finished session.

use std::collections::BTreeMap;

use crate::ledger::AnswerSnapshot;
use crate::model::{
    Answer, DifficultyScores, ProficiencyLevel, Question, QuestionKind, Recommendation,
    ScoreBreakdown, SessionResult, TopicScore, WrongAnswer,
};

/// Minimum number of distinct expected keywords an essay must mention.
///
/// Fixed regardless of how many keywords the question lists, so a two-keyword
/// essay needs both.
pub const ESSAY_KEYWORD_THRESHOLD: usize = 2;

/// Correct-answer description used for every essay question.
pub const ESSAY_ANSWER_HINT: &str = "Answer should include the key points";

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Grade every question independently and aggregate.
    #[must_use]
    pub fn grade(
        &self,
        questions: &[Question],
        answers: &AnswerSnapshot,
        time_spent_seconds: u64,
    ) -> ScoreBreakdown {
        let mut topics: BTreeMap<String, TopicScore> = questions
            .iter()
            .map(|q| (q.topic.clone(), TopicScore::default()))
            .collect();
        let mut difficulty = DifficultyScores::default();
        let mut wrong_answers = Vec::new();
        let mut total = 0.0_f64;

        #[allow(clippy::cast_precision_loss)]
        let share = if questions.is_empty() {
            0.0
        } else {
            100.0 / questions.len() as f64
        };

        for question in questions {
            if is_correct(question, answers.get(question.id)) {
                total += share;
                if let Some(topic) = topics.get_mut(&question.topic) {
                    topic.score = topic.score.saturating_add(1);
                }
                difficulty.bump(question.difficulty);
            } else {
                wrong_answers.push(WrongAnswer {
                    question_id: question.id,
                    question: question.stem.clone(),
                    correct_answer_description: describe_correct_answer(question),
                    explanation: question.explanation.clone(),
                });
            }
        }

        ScoreBreakdown {
            total_score_percent: total.round().clamp(0.0, 100.0),
            topics,
            difficulty,
            wrong_answers,
            time_spent_seconds,
        }
    }

    /// Grade and derive the level and study plan in one step.
    #[must_use]
    pub fn evaluate(
        &self,
        questions: &[Question],
        answers: &AnswerSnapshot,
        time_spent_seconds: u64,
    ) -> SessionResult {
        session_result(self.grade(questions, answers, time_spent_seconds))
    }
}

/// Wrap a breakdown (local or server-graded) with its level and recommendations.
#[must_use]
pub fn session_result(breakdown: ScoreBreakdown) -> SessionResult {
    SessionResult {
        level: ProficiencyLevel::from_score(breakdown.total_score_percent),
        recommendations: recommendations(&breakdown),
        breakdown,
    }
}

/// One recommendation per topic, weakest topic first.
///
/// Ties keep alphabetical topic order.
#[must_use]
pub fn recommendations(breakdown: &ScoreBreakdown) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = breakdown
        .topics
        .iter()
        .map(|(topic, score)| Recommendation {
            topic: topic.clone(),
            score: score.score,
            message: format!(
                "Review \"{topic}\": {} correct answer(s) in this topic.",
                score.score
            ),
        })
        .collect();
    out.sort_by_key(|r| r.score);
    out
}

fn is_correct(question: &Question, answer: Option<&Answer>) -> bool {
    match (&question.kind, answer) {
        (QuestionKind::Mcq { correct_index, .. }, Some(Answer::Mcq { answer_index })) => {
            *answer_index == Some(*correct_index)
        }
        (QuestionKind::Essay { expected_keywords }, Some(Answer::Essay { answer_text })) => {
            matched_keywords(answer_text, expected_keywords) >= ESSAY_KEYWORD_THRESHOLD
        }
        _ => false,
    }
}

/// Count expected keywords present as case-insensitive substrings.
#[must_use]
pub fn matched_keywords(text: &str, expected_keywords: &[String]) -> usize {
    let haystack = text.to_lowercase();
    let mut seen: Vec<String> = Vec::with_capacity(expected_keywords.len());
    for keyword in expected_keywords {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() || seen.contains(&needle) {
            continue;
        }
        if haystack.contains(&needle) {
            seen.push(needle);
        }
    }
    seen.len()
}

fn describe_correct_answer(question: &Question) -> String {
    match &question.kind {
        QuestionKind::Mcq { correct_index, .. } => option_letter(*correct_index),
        QuestionKind::Essay { .. } => ESSAY_ANSWER_HINT.to_owned(),
    }
}

/// `0 -> "A"`, `1 -> "B"`, ... past `Z` falls back to the 1-based number.
fn option_letter(index: usize) -> String {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map_or_else(|| (index + 1).to_string(), |i| char::from(b'A' + i).to_string())
}
