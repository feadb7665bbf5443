//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use exam_core::model::{AssessmentId, SessionId};
use storage::repository::StorageError;

/// Errors emitted by question sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("assessment {0} not found")]
    NotFound(AssessmentId),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse question set: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors emitted by submission sinks.
///
/// Every variant is recoverable from the session's point of view: the
/// submission is rolled back and can be retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    #[error("submission endpoint is not configured")]
    Disabled,
    #[error("submission request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("submission was rejected: {0}")]
    Rejected(String),
    #[error("server-graded submission returned no score")]
    MissingScore,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no draft saved for this session")]
    NoDraft,
    #[error("session {0} was already submitted")]
    AlreadySubmitted(SessionId),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
