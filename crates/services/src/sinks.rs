//! Where finished sessions go.
//!
//! Two shapes share one contract: a server-graded sink answers with a
//! `ScoreBreakdown`, a local-graded sink only acknowledges and keeps the
//! locally computed score for audit.

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use exam_core::Clock;
use exam_core::model::{GradingMode, ScoreBreakdown, SessionId, SubmissionPayload, SubmitTrigger};
use reqwest::Client;
use serde::Serialize;
use storage::repository::{SubmissionRecord, SubmissionRepository};

use crate::error::SinkError;

/// One finished attempt handed downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub session_id: SessionId,
    pub trigger: SubmitTrigger,
    pub grading: GradingMode,
    pub payload: SubmissionPayload,
    /// Set when the session was graded in-process.
    pub local_score: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkResponse {
    /// The sink graded the submission.
    Graded(ScoreBreakdown),
    /// The sink stored the submission without grading it.
    Acknowledged,
}

/// Receives finished submissions.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Deliver a submission.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` on delivery failure; the session rolls back and the
    /// learner may retry.
    async fn submit(&self, submission: &Submission) -> Result<SinkResponse, SinkError>;
}

//
// ─── RECORDING SINK ────────────────────────────────────────────────────────────
//

/// Stores every delivered submission in the audit trail.
///
/// Optionally forwards to an upstream sink first (e.g. the grading server) and
/// records whatever breakdown it returned.
#[derive(Clone)]
pub struct RecordingSink {
    clock: Clock,
    submissions: Arc<dyn SubmissionRepository>,
    upstream: Option<Arc<dyn SubmissionSink>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new(clock: Clock, submissions: Arc<dyn SubmissionRepository>) -> Self {
        Self {
            clock,
            submissions,
            upstream: None,
        }
    }

    #[must_use]
    pub fn with_upstream(mut self, upstream: Arc<dyn SubmissionSink>) -> Self {
        self.upstream = Some(upstream);
        self
    }
}

#[async_trait]
impl SubmissionSink for RecordingSink {
    async fn submit(&self, submission: &Submission) -> Result<SinkResponse, SinkError> {
        let response = match &self.upstream {
            Some(upstream) => upstream.submit(submission).await?,
            None => SinkResponse::Acknowledged,
        };

        let breakdown = match &response {
            SinkResponse::Graded(breakdown) => Some(breakdown.clone()),
            SinkResponse::Acknowledged => submission.local_score.clone(),
        };
        let record = SubmissionRecord {
            session_id: submission.session_id,
            submitted_at: self.clock.now(),
            trigger: submission.trigger,
            grading: submission.grading,
            payload: submission.payload.clone(),
            breakdown,
        };
        let id = self.submissions.append_submission(&record).await?;
        tracing::debug!(session_id = %submission.session_id, record_id = id, "submission recorded");
        Ok(response)
    }
}

//
// ─── HTTP SINK ─────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct HttpSinkConfig {
    pub url: String,
    pub token: Option<String>,
}

impl HttpSinkConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let url = env::var("EXAM_SINK_URL").ok()?;
        if url.trim().is_empty() {
            return None;
        }
        let token = env::var("EXAM_SINK_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self { url, token })
    }
}

/// POSTs submissions as JSON to a grading/storage endpoint.
#[derive(Clone)]
pub struct HttpSubmissionSink {
    client: Client,
    config: Option<HttpSinkConfig>,
}

impl HttpSubmissionSink {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(HttpSinkConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<HttpSinkConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    session_id: SessionId,
    #[serde(flatten)]
    payload: &'a SubmissionPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_score: Option<&'a ScoreBreakdown>,
}

#[async_trait]
impl SubmissionSink for HttpSubmissionSink {
    async fn submit(&self, submission: &Submission) -> Result<SinkResponse, SinkError> {
        let config = self.config.as_ref().ok_or(SinkError::Disabled)?;
        let body = SubmitRequest {
            session_id: submission.session_id,
            payload: &submission.payload,
            local_score: submission.local_score.as_ref(),
        };

        let mut request = self.client.post(&config.url).json(&body);
        if let Some(token) = &config.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected(if message.trim().is_empty() {
                status.to_string()
            } else {
                message
            }));
        }
        if !status.is_success() {
            return Err(SinkError::HttpStatus(status));
        }

        match submission.grading {
            GradingMode::Local => Ok(SinkResponse::Acknowledged),
            GradingMode::Server => {
                let breakdown: ScoreBreakdown = response.json().await?;
                Ok(SinkResponse::Graded(breakdown))
            }
        }
    }
}
