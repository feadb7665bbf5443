//! Where question sets come from.
//!
//! A session asks its source once, at start, and never re-fetches.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use exam_core::model::{AssessmentId, Question};

use crate::error::SourceError;

/// Supplies the ordered question set for an assessment.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Load the questions for `assessment`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the set is missing or cannot be decoded.
    async fn load(&self, assessment: &AssessmentId) -> Result<Vec<Question>, SourceError>;
}

/// Fixed in-memory question sets, mostly for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticQuestionSource {
    sets: HashMap<AssessmentId, Vec<Question>>,
}

impl StaticQuestionSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_set(mut self, assessment: AssessmentId, questions: Vec<Question>) -> Self {
        self.sets.insert(assessment, questions);
        self
    }
}

#[async_trait]
impl QuestionSource for StaticQuestionSource {
    async fn load(&self, assessment: &AssessmentId) -> Result<Vec<Question>, SourceError> {
        self.sets
            .get(assessment)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(assessment.clone()))
    }
}

/// Reads `<dir>/<assessment>.json`, a JSON array of questions.
#[derive(Debug, Clone)]
pub struct JsonFileQuestionSource {
    dir: PathBuf,
}

impl JsonFileQuestionSource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path_for(&self, assessment: &AssessmentId) -> PathBuf {
        self.dir.join(format!("{}.json", assessment.as_str()))
    }
}

#[async_trait]
impl QuestionSource for JsonFileQuestionSource {
    async fn load(&self, assessment: &AssessmentId) -> Result<Vec<Question>, SourceError> {
        let path = self.path_for(assessment);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(assessment.clone()));
            }
            Err(source) => return Err(SourceError::Io { path, source }),
        };
        let questions: Vec<Question> = serde_json::from_str(&raw)?;
        tracing::debug!(%assessment, count = questions.len(), "question set loaded");
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{Difficulty, QuestionId};

    #[tokio::test]
    async fn json_source_reads_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let questions = vec![Question::mcq(
            QuestionId::new(1),
            "Capital of France?",
            vec!["Paris".into(), "Rome".into()],
            0,
            "geo",
            Difficulty::Easy,
        )];
        std::fs::write(
            dir.path().join("geo-101.json"),
            serde_json::to_string(&questions).unwrap(),
        )
        .unwrap();

        let source = JsonFileQuestionSource::new(dir.path());
        let loaded = source.load(&AssessmentId::new("geo-101")).await.unwrap();
        assert_eq!(loaded, questions);

        let missing = source.load(&AssessmentId::new("nope")).await.unwrap_err();
        assert!(matches!(missing, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn json_source_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let err = JsonFileQuestionSource::new(dir.path())
            .load(&AssessmentId::new("broken"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[tokio::test]
    async fn static_source_returns_registered_set() {
        let id = AssessmentId::new("empty");
        let source = StaticQuestionSource::new().with_set(id.clone(), Vec::new());
        assert!(source.load(&id).await.unwrap().is_empty());
    }
}
