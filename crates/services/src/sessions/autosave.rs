//! Draft persistence around a session.

use std::sync::Arc;

use exam_core::guard::ConfirmPort;
use exam_core::ledger::EditOutcome;
use exam_core::model::{QuestionId, SubmitTrigger};
use storage::repository::{DraftRecord, DraftRepository};

use crate::error::SessionError;

use super::controller::{SessionController, SubmitOutcome, TickReport};

/// A session that saves its answers after every applied edit.
///
/// The draft is removed once the session is submitted. Without a draft
/// repository it behaves exactly like the wrapped controller.
pub struct AutosaveSession {
    inner: SessionController,
    drafts: Option<Arc<dyn DraftRepository>>,
}

impl AutosaveSession {
    #[must_use]
    pub fn new(inner: SessionController, drafts: Arc<dyn DraftRepository>) -> Self {
        Self {
            inner,
            drafts: Some(drafts),
        }
    }

    /// Wrap a session without persisting anything.
    #[must_use]
    pub fn ephemeral(inner: SessionController) -> Self {
        Self {
            inner,
            drafts: None,
        }
    }

    /// Load the saved draft for `inner`'s session id into it.
    ///
    /// Returns the session and how many saved answers still matched the
    /// question set.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoDraft` if nothing was saved, or a storage error.
    pub async fn resume(
        mut inner: SessionController,
        drafts: Arc<dyn DraftRepository>,
    ) -> Result<(Self, usize), SessionError> {
        let draft = drafts
            .load_draft(inner.id())
            .await?
            .ok_or(SessionError::NoDraft)?;
        let restored = inner.load_answers(draft.answers);
        tracing::info!(session_id = %inner.id(), restored, "draft resumed");
        Ok((Self::new(inner, drafts), restored))
    }

    #[must_use]
    pub fn controller(&self) -> &SessionController {
        &self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> SessionController {
        self.inner
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the draft could not be saved. The
    /// edit itself is kept.
    pub async fn set_mcq_answer(
        &mut self,
        question_id: QuestionId,
        index: Option<usize>,
    ) -> Result<EditOutcome, SessionError> {
        let outcome = self.inner.set_mcq_answer(question_id, index);
        self.persist_if(outcome).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the draft could not be saved.
    pub async fn set_essay_answer(
        &mut self,
        question_id: QuestionId,
        text: impl Into<String>,
    ) -> Result<EditOutcome, SessionError> {
        let outcome = self.inner.set_essay_answer(question_id, text);
        self.persist_if(outcome).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the draft could not be saved.
    pub async fn clear_answer(&mut self, question_id: QuestionId) -> Result<EditOutcome, SessionError> {
        let outcome = self.inner.clear_answer(question_id);
        self.persist_if(outcome).await
    }

    pub fn extend_time(&mut self, seconds: u32) {
        self.inner.extend_time(seconds);
    }

    pub fn close(&mut self) {
        self.inner.close();
    }

    pub async fn tick(&mut self) -> TickReport {
        let report = self.inner.tick().await;
        if matches!(report.submission, Some(Ok(SubmitOutcome::Submitted(_)))) {
            self.discard_draft().await;
        }
        report
    }

    /// # Errors
    ///
    /// See [`SessionController::request_submit`].
    pub async fn request_submit(
        &mut self,
        trigger: SubmitTrigger,
        confirm: &dyn ConfirmPort,
    ) -> Result<SubmitOutcome, SessionError> {
        let outcome = self.inner.request_submit(trigger, confirm).await?;
        if outcome.is_submitted() {
            self.discard_draft().await;
        }
        Ok(outcome)
    }

    async fn persist_if(&self, outcome: EditOutcome) -> Result<EditOutcome, SessionError> {
        let Some(drafts) = &self.drafts else {
            return Ok(outcome);
        };
        if !outcome.is_applied() {
            return Ok(outcome);
        }
        let draft = DraftRecord {
            session_id: self.inner.id(),
            answers: self.inner.answers().as_map().clone(),
            saved_at: self.inner.clock().now(),
        };
        drafts.save_draft(&draft).await?;
        Ok(outcome)
    }

    // The submission already succeeded; a stale draft is only a cleanup miss.
    async fn discard_draft(&self) {
        let Some(drafts) = &self.drafts else {
            return;
        };
        if let Err(err) = drafts.clear_draft(self.inner.id()).await {
            tracing::warn!(session_id = %self.inner.id(), error = %err, "failed to clear draft");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::RecordingSink;
    use exam_core::model::{AssessmentSettings, Difficulty, GradingMode, Question};
    use exam_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn session(repo: &InMemoryRepository) -> SessionController {
        let questions = vec![Question::mcq(
            QuestionId::new(7),
            "Pick",
            vec!["a".into(), "b".into()],
            0,
            "basics",
            Difficulty::Easy,
        )];
        SessionController::new(
            questions,
            AssessmentSettings::new(600, GradingMode::Local),
            fixed_clock(),
            Arc::new(RecordingSink::new(fixed_clock(), Arc::new(repo.clone()))),
        )
    }

    #[tokio::test]
    async fn applied_edits_are_saved_and_cleared_on_submit() {
        let repo = InMemoryRepository::new();
        let mut autosave = AutosaveSession::new(session(&repo), Arc::new(repo.clone()));
        let id = autosave.controller().id();

        let rejected = autosave.set_mcq_answer(QuestionId::new(99), Some(0)).await.unwrap();
        assert_eq!(rejected, EditOutcome::UnknownQuestion);
        assert_eq!(repo.load_draft(id).await.unwrap(), None);

        let applied = autosave.set_mcq_answer(QuestionId::new(7), Some(0)).await.unwrap();
        assert!(applied.is_applied());
        let draft = repo.load_draft(id).await.unwrap().expect("draft saved");
        assert_eq!(draft.answers.len(), 1);

        let approve = |_: &exam_core::guard::ConfirmRequest| true;
        let outcome = autosave.request_submit(SubmitTrigger::Manual, &approve).await.unwrap();
        assert!(outcome.is_submitted());
        assert_eq!(repo.load_draft(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn resume_requires_a_draft() {
        let repo = InMemoryRepository::new();
        let err = AutosaveSession::resume(session(&repo), Arc::new(repo.clone()))
            .await
            .err()
            .expect("no draft");
        assert!(matches!(err, SessionError::NoDraft));
    }
}
