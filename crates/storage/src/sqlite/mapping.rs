use std::collections::BTreeMap;

use exam_core::model::{
    Answer, GradingMode, QuestionId, ScoreBreakdown, SessionId, SubmissionPayload,
    SubmitTrigger, SubmittedAnswer,
};
use sqlx::Row;

use crate::repository::{StorageError, SubmissionRecord};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn session_id_to_text(id: SessionId) -> String {
    id.to_string()
}

pub(crate) fn session_id_from_text(raw: &str) -> Result<SessionId, StorageError> {
    raw.parse().map_err(ser)
}

/// Storage encoding for triggers: `manual` / `auto`.
pub(crate) fn trigger_to_str(trigger: SubmitTrigger) -> &'static str {
    match trigger {
        SubmitTrigger::Manual => "manual",
        SubmitTrigger::Auto => "auto",
    }
}

pub(crate) fn trigger_from_str(s: &str) -> Result<SubmitTrigger, StorageError> {
    match s {
        "manual" => Ok(SubmitTrigger::Manual),
        "auto" => Ok(SubmitTrigger::Auto),
        _ => Err(StorageError::Serialization(format!("invalid trigger: {s}"))),
    }
}

pub(crate) fn grading_to_str(grading: GradingMode) -> &'static str {
    match grading {
        GradingMode::Local => "local",
        GradingMode::Server => "server",
    }
}

pub(crate) fn grading_from_str(s: &str) -> Result<GradingMode, StorageError> {
    match s {
        "local" => Ok(GradingMode::Local),
        "server" => Ok(GradingMode::Server),
        _ => Err(StorageError::Serialization(format!("invalid grading: {s}"))),
    }
}

/// Draft answers are stored as a JSON array of `[question_id, answer]` pairs.
pub(crate) fn answers_to_json(answers: &BTreeMap<QuestionId, Answer>) -> Result<String, StorageError> {
    let pairs: Vec<(&QuestionId, &Answer)> = answers.iter().collect();
    serde_json::to_string(&pairs).map_err(ser)
}

pub(crate) fn answers_from_json(raw: &str) -> Result<BTreeMap<QuestionId, Answer>, StorageError> {
    let pairs: Vec<(QuestionId, Answer)> = serde_json::from_str(raw).map_err(ser)?;
    Ok(pairs.into_iter().collect())
}

pub(crate) fn map_submission_row(row: &sqlx::sqlite::SqliteRow) -> Result<SubmissionRecord, StorageError> {
    let session_id = session_id_from_text(&row.try_get::<String, _>("session_id").map_err(ser)?)?;
    let trigger = trigger_from_str(&row.try_get::<String, _>("submit_trigger").map_err(ser)?)?;
    let grading = grading_from_str(&row.try_get::<String, _>("grading").map_err(ser)?)?;

    let time_spent: i64 = row.try_get("time_spent_seconds").map_err(ser)?;
    let time_spent_seconds = u64::try_from(time_spent)
        .map_err(|_| StorageError::Serialization(format!("invalid time_spent_seconds: {time_spent}")))?;

    let answers: Vec<SubmittedAnswer> =
        serde_json::from_str(&row.try_get::<String, _>("answers_json").map_err(ser)?).map_err(ser)?;

    let breakdown = row
        .try_get::<Option<String>, _>("breakdown_json")
        .map_err(ser)?
        .map(|raw| serde_json::from_str::<ScoreBreakdown>(&raw).map_err(ser))
        .transpose()?;

    Ok(SubmissionRecord {
        session_id,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
        trigger,
        grading,
        payload: SubmissionPayload {
            answers,
            time_spent_seconds,
        },
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_answers_json_round_trip() {
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::new(4), Answer::Mcq { answer_index: None });
        answers.insert(
            QuestionId::new(9),
            Answer::Essay {
                answer_text: "ownership".into(),
            },
        );
        let raw = answers_to_json(&answers).unwrap();
        assert_eq!(answers_from_json(&raw).unwrap(), answers);
    }

    #[test]
    fn rejects_unknown_enum_encodings() {
        assert!(trigger_from_str("timer").is_err());
        assert!(grading_from_str("remote").is_err());
    }
}
