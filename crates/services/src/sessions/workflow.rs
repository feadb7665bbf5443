use std::sync::Arc;

use exam_core::model::{AssessmentId, AssessmentSettings, SessionId};
use storage::repository::{DraftRepository, SubmissionRepository};

use crate::Clock;
use crate::error::SessionError;
use crate::sinks::SubmissionSink;
use crate::sources::QuestionSource;

use super::autosave::AutosaveSession;
use super::controller::SessionController;

/// Starts and resumes sessions from a question source.
#[derive(Clone)]
pub struct AssessmentService {
    clock: Clock,
    source: Arc<dyn QuestionSource>,
    sink: Arc<dyn SubmissionSink>,
    drafts: Option<Arc<dyn DraftRepository>>,
    submissions: Option<Arc<dyn SubmissionRepository>>,
}

impl AssessmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        source: Arc<dyn QuestionSource>,
        sink: Arc<dyn SubmissionSink>,
    ) -> Self {
        Self {
            clock,
            source,
            sink,
            drafts: None,
            submissions: None,
        }
    }

    #[must_use]
    pub fn with_drafts(mut self, drafts: Arc<dyn DraftRepository>) -> Self {
        self.drafts = Some(drafts);
        self
    }

    /// Audit trail consulted before resuming, so a submitted session stays closed.
    #[must_use]
    pub fn with_submissions(mut self, submissions: Arc<dyn SubmissionRepository>) -> Self {
        self.submissions = Some(submissions);
        self
    }

    /// Load the assessment's questions and start a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Source` if the question set cannot be loaded.
    pub async fn start(
        &self,
        assessment: &AssessmentId,
        settings: AssessmentSettings,
    ) -> Result<AutosaveSession, SessionError> {
        let questions = self.source.load(assessment).await?;
        let controller =
            SessionController::new(questions, settings, self.clock, Arc::clone(&self.sink));
        Ok(self.wrap(controller))
    }

    /// Start a session under an existing id and restore its saved draft.
    ///
    /// The countdown starts over from the full duration; only answers are
    /// carried across.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoDraft` if drafts are disabled or nothing was
    /// saved for `session_id`, `SessionError::AlreadySubmitted` if the audit
    /// trail already holds a submission for it (the stale draft is dropped),
    /// or source/storage errors.
    pub async fn resume(
        &self,
        assessment: &AssessmentId,
        settings: AssessmentSettings,
        session_id: SessionId,
    ) -> Result<(AutosaveSession, usize), SessionError> {
        let drafts = self.drafts.clone().ok_or(SessionError::NoDraft)?;
        if let Some(submissions) = &self.submissions {
            if !submissions.list_submissions(session_id).await?.is_empty() {
                tracing::warn!(%session_id, "refusing to resume a submitted session");
                drafts.clear_draft(session_id).await?;
                return Err(SessionError::AlreadySubmitted(session_id));
            }
        }
        let questions = self.source.load(assessment).await?;
        let controller = SessionController::with_id(
            session_id,
            questions,
            settings,
            self.clock,
            Arc::clone(&self.sink),
        );
        AutosaveSession::resume(controller, drafts).await
    }

    fn wrap(&self, controller: SessionController) -> AutosaveSession {
        match &self.drafts {
            Some(drafts) => AutosaveSession::new(controller, Arc::clone(drafts)),
            None => AutosaveSession::ephemeral(controller),
        }
    }
}
