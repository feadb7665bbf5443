use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{
    Answer, GradingMode, QuestionId, ScoreBreakdown, SessionId, SubmissionPayload, SubmitTrigger,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Audit copy of one submission as handed to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub session_id: SessionId,
    pub submitted_at: DateTime<Utc>,
    pub trigger: SubmitTrigger,
    pub grading: GradingMode,
    pub payload: SubmissionPayload,
    /// Present when the session was graded locally.
    pub breakdown: Option<ScoreBreakdown>,
}

/// Stored submission with its storage id.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRow {
    pub id: i64,
    pub record: SubmissionRecord,
}

impl SubmissionRow {
    #[must_use]
    pub fn new(id: i64, record: SubmissionRecord) -> Self {
        Self { id, record }
    }
}

/// In-progress answers saved so a session can be resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRecord {
    pub session_id: SessionId,
    pub answers: BTreeMap<QuestionId, Answer>,
    pub saved_at: DateTime<Utc>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Append-only audit trail of submissions.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Store a submission and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append_submission(&self, record: &SubmissionRecord) -> Result<i64, StorageError>;

    /// Fetch a submission by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_submission(&self, id: i64) -> Result<SubmissionRecord, StorageError>;

    /// All submissions for a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn list_submissions(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SubmissionRow>, StorageError>;
}

/// Draft answers keyed by session id. One draft per session; saves overwrite.
#[async_trait]
pub trait DraftRepository: Send + Sync {
    /// Insert or replace the draft for its session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the draft cannot be stored.
    async fn save_draft(&self, draft: &DraftRecord) -> Result<(), StorageError>;

    /// Load the draft for a session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn load_draft(&self, session_id: SessionId) -> Result<Option<DraftRecord>, StorageError>;

    /// Remove the draft for a session. Missing drafts are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failures.
    async fn clear_draft(&self, session_id: SessionId) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    submissions: Arc<Mutex<Vec<SubmissionRecord>>>,
    drafts: Arc<Mutex<HashMap<SessionId, DraftRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: ToString>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl SubmissionRepository for InMemoryRepository {
    async fn append_submission(&self, record: &SubmissionRecord) -> Result<i64, StorageError> {
        let mut guard = self.submissions.lock().map_err(poisoned)?;
        guard.push(record.clone());
        i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("submission id overflow".into()))
    }

    async fn get_submission(&self, id: i64) -> Result<SubmissionRecord, StorageError> {
        let guard = self.submissions.lock().map_err(poisoned)?;
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| guard.get(i))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_submissions(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SubmissionRow>, StorageError> {
        let guard = self.submissions.lock().map_err(poisoned)?;
        let mut out = Vec::new();
        for (idx, record) in guard.iter().enumerate() {
            if record.session_id != session_id {
                continue;
            }
            let id = i64::try_from(idx + 1)
                .map_err(|_| StorageError::Serialization("submission id overflow".into()))?;
            out.push(SubmissionRow::new(id, record.clone()));
        }
        Ok(out)
    }
}

#[async_trait]
impl DraftRepository for InMemoryRepository {
    async fn save_draft(&self, draft: &DraftRecord) -> Result<(), StorageError> {
        let mut guard = self.drafts.lock().map_err(poisoned)?;
        guard.insert(draft.session_id, draft.clone());
        Ok(())
    }

    async fn load_draft(&self, session_id: SessionId) -> Result<Option<DraftRecord>, StorageError> {
        let guard = self.drafts.lock().map_err(poisoned)?;
        Ok(guard.get(&session_id).cloned())
    }

    async fn clear_draft(&self, session_id: SessionId) -> Result<(), StorageError> {
        let mut guard = self.drafts.lock().map_err(poisoned)?;
        guard.remove(&session_id);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub submissions: Arc<dyn SubmissionRepository>,
    pub drafts: Arc<dyn DraftRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let submissions: Arc<dyn SubmissionRepository> = Arc::new(repo.clone());
        let drafts: Arc<dyn DraftRepository> = Arc::new(repo);
        Self {
            submissions,
            drafts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::SubmittedAnswer;
    use exam_core::time::fixed_now;

    fn record(session_id: SessionId) -> SubmissionRecord {
        SubmissionRecord {
            session_id,
            submitted_at: fixed_now(),
            trigger: SubmitTrigger::Manual,
            grading: GradingMode::Server,
            payload: SubmissionPayload {
                answers: vec![SubmittedAnswer {
                    question_id: QuestionId::new(1),
                    answer_index: Some(2),
                    answer_text: None,
                }],
                time_spent_seconds: 30,
            },
            breakdown: None,
        }
    }

    #[tokio::test]
    async fn submissions_are_listed_per_session() {
        let repo = InMemoryRepository::new();
        let a = SessionId::generate();
        let b = SessionId::generate();
        let first = repo.append_submission(&record(a)).await.unwrap();
        repo.append_submission(&record(b)).await.unwrap();
        let third = repo.append_submission(&record(a)).await.unwrap();

        let rows = repo.list_submissions(a).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, third]);
        assert_eq!(repo.get_submission(first).await.unwrap(), record(a));
        assert!(matches!(
            repo.get_submission(99).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn drafts_overwrite_and_clear() {
        let repo = InMemoryRepository::new();
        let session_id = SessionId::generate();
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::new(1), Answer::Mcq { answer_index: Some(0) });
        let mut draft = DraftRecord {
            session_id,
            answers,
            saved_at: fixed_now(),
        };
        repo.save_draft(&draft).await.unwrap();

        draft.answers.insert(
            QuestionId::new(2),
            Answer::Essay {
                answer_text: "text".into(),
            },
        );
        repo.save_draft(&draft).await.unwrap();
        assert_eq!(repo.load_draft(session_id).await.unwrap(), Some(draft));

        repo.clear_draft(session_id).await.unwrap();
        repo.clear_draft(session_id).await.unwrap();
        assert_eq!(repo.load_draft(session_id).await.unwrap(), None);
    }
}
