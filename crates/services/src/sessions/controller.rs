//! One timed attempt at an assessment.
//!
//! The controller is the single writer of a session: it owns the countdown,
//! the answer ledger and the submission guard, and is the only place the
//! three meet. Hosts drive it with `tick` once per elapsed second and forward
//! learner input to the edit and submit methods.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use exam_core::countdown::{ClockEvent, CountdownClock};
use exam_core::guard::{ConfirmPort, ConfirmRequest, SubmissionGuard, SubmitDecision};
use exam_core::ledger::{AnswerLedger, AnswerSnapshot, EditOutcome};
use exam_core::model::{
    Answer, AssessmentSettings, GradingMode, Question, QuestionId, ScoreBreakdown, SessionId,
    SessionProgress, SessionResult, SessionState, SubmissionPayload, SubmitTrigger,
    validate_question_set,
};
use exam_core::scoring::{self, ScoringEngine};
use exam_core::Clock;

use crate::error::{SessionError, SinkError};
use crate::sinks::{SinkResponse, Submission, SubmissionSink};

/// What a submit request ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(SessionResult),
    /// Another submission is running or already finished.
    Ignored,
    /// The question set is empty or malformed.
    Disabled,
    /// The learner chose to keep working.
    Declined { unanswered: usize },
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted(_))
    }
}

/// Everything one `tick` produced.
#[derive(Debug, Default)]
pub struct TickReport {
    pub events: Vec<ClockEvent>,
    /// Present when this tick expired the countdown and attempted an auto submit.
    pub submission: Option<Result<SubmitOutcome, SessionError>>,
}

impl TickReport {
    #[must_use]
    pub fn expired(&self) -> bool {
        self.events.contains(&ClockEvent::Expired)
    }
}

fn auto_confirm(_: &ConfirmRequest) -> bool {
    true
}

pub struct SessionController {
    id: SessionId,
    questions: Arc<[Question]>,
    settings: AssessmentSettings,
    clock: Clock,
    countdown: CountdownClock,
    ledger: AnswerLedger,
    guard: SubmissionGuard,
    sink: Arc<dyn SubmissionSink>,
    engine: ScoringEngine,
    result: Option<SessionResult>,
}

impl SessionController {
    /// Start a session: record the start time and start the countdown.
    ///
    /// An empty or malformed question set still yields a session, but one
    /// that can never be submitted.
    #[must_use]
    pub fn new(
        questions: Vec<Question>,
        settings: AssessmentSettings,
        clock: Clock,
        sink: Arc<dyn SubmissionSink>,
    ) -> Self {
        Self::with_id(SessionId::generate(), questions, settings, clock, sink)
    }

    #[must_use]
    pub fn with_id(
        id: SessionId,
        questions: Vec<Question>,
        settings: AssessmentSettings,
        clock: Clock,
        sink: Arc<dyn SubmissionSink>,
    ) -> Self {
        let submittable = match validate_question_set(&questions) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(session_id = %id, error = %err, "question set cannot be submitted");
                false
            }
        };

        let mut countdown = CountdownClock::new();
        countdown.start(i64::from(settings.duration_seconds()));

        tracing::info!(
            session_id = %id,
            questions = questions.len(),
            duration_seconds = settings.duration_seconds(),
            grading = ?settings.grading(),
            "session started"
        );

        Self {
            id,
            ledger: AnswerLedger::new(&questions),
            questions: questions.into(),
            settings,
            guard: SubmissionGuard::new(clock.now(), submittable),
            clock,
            countdown,
            sink,
            engine: ScoringEngine::new(),
            result: None,
        }
    }

    // ─── Accessors ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn settings(&self) -> &AssessmentSettings {
        &self.settings
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.guard.started_at()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.guard.state()
    }

    #[must_use]
    pub fn is_submittable(&self) -> bool {
        self.guard.is_submittable()
    }

    #[must_use]
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn time_left_seconds(&self) -> u32 {
        self.countdown.time_left_seconds()
    }

    /// Whether the host should keep delivering ticks.
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.countdown.is_running()
    }

    #[must_use]
    pub fn answer(&self, question_id: QuestionId) -> Option<&Answer> {
        self.ledger.answer(question_id)
    }

    #[must_use]
    pub fn answers(&self) -> AnswerSnapshot {
        self.ledger.snapshot()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.ledger.answered_count(&self.questions)
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.questions.len() - self.answered_count()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answered = self.answered_count();
        SessionProgress {
            total: self.questions.len(),
            answered,
            unanswered: self.questions.len() - answered,
            time_left_seconds: self.time_left_seconds(),
            state: self.state(),
        }
    }

    // ─── Editing ───────────────────────────────────────────────────────────

    pub fn set_mcq_answer(&mut self, question_id: QuestionId, index: Option<usize>) -> EditOutcome {
        let outcome = self.ledger.set_mcq_answer(question_id, index);
        self.log_edit(question_id, outcome)
    }

    pub fn set_essay_answer(&mut self, question_id: QuestionId, text: impl Into<String>) -> EditOutcome {
        let outcome = self.ledger.set_essay_answer(question_id, text);
        self.log_edit(question_id, outcome)
    }

    pub fn clear_answer(&mut self, question_id: QuestionId) -> EditOutcome {
        let outcome = self.ledger.clear_answer(question_id);
        self.log_edit(question_id, outcome)
    }

    /// Replace all answers, e.g. when resuming a draft. Returns how many were kept.
    pub fn load_answers(&mut self, answers: BTreeMap<QuestionId, Answer>) -> usize {
        self.ledger.load(answers)
    }

    fn log_edit(&self, question_id: QuestionId, outcome: EditOutcome) -> EditOutcome {
        if !outcome.is_applied() {
            tracing::debug!(session_id = %self.id, %question_id, ?outcome, "answer edit rejected");
        }
        outcome
    }

    // ─── Time ──────────────────────────────────────────────────────────────

    /// Add time to a running countdown.
    pub fn extend_time(&mut self, seconds: u32) {
        if self.state().is_in_progress() {
            self.countdown.extend(seconds);
        }
    }

    /// Advance the session by one second.
    ///
    /// When the countdown expires the session submits itself without asking
    /// for confirmation; the outcome of that attempt is in the report.
    pub async fn tick(&mut self) -> TickReport {
        let events = self.countdown.tick();
        if events.is_empty() {
            return TickReport::default();
        }
        self.clock.advance(Duration::seconds(1));

        let mut report = TickReport {
            events,
            submission: None,
        };
        if report.expired() {
            report.submission = Some(self.request_submit(SubmitTrigger::Auto, &auto_confirm).await);
        }
        report
    }

    /// Stop the countdown. Idempotent; answers and state are kept.
    pub fn close(&mut self) {
        if self.countdown.is_running() {
            tracing::debug!(session_id = %self.id, "session closed");
        }
        self.countdown.stop();
    }

    // ─── Submission ────────────────────────────────────────────────────────

    /// Submit the session.
    ///
    /// Manual requests with unanswered questions go through `confirm` first.
    /// At most one submission ever succeeds; requests arriving while one is in
    /// flight or after it finished are `Ignored`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Sink` if delivery failed. The session is back in
    /// progress with exactly the answers it had before, and may be submitted
    /// again.
    pub async fn request_submit(
        &mut self,
        trigger: SubmitTrigger,
        confirm: &dyn ConfirmPort,
    ) -> Result<SubmitOutcome, SessionError> {
        let answered = self.answered_count();
        let decision = self.guard.request_submit(
            trigger,
            answered,
            self.questions.len(),
            confirm,
            &self.clock,
        );
        let ticket = match decision {
            SubmitDecision::Proceed(ticket) => ticket,
            SubmitDecision::Ignored => return Ok(SubmitOutcome::Ignored),
            SubmitDecision::Disabled => {
                tracing::warn!(session_id = %self.id, ?trigger, "submit requested on a session without questions");
                return Ok(SubmitOutcome::Disabled);
            }
            SubmitDecision::Declined { unanswered } => {
                return Ok(SubmitOutcome::Declined { unanswered });
            }
        };

        let snapshot = self.ledger.freeze();
        let grading = self.settings.grading();
        let local_score = match grading {
            GradingMode::Local => Some(self.engine.grade(
                &self.questions,
                &snapshot,
                ticket.time_spent_seconds,
            )),
            GradingMode::Server => None,
        };
        let submission = Submission {
            session_id: self.id,
            trigger,
            grading,
            payload: SubmissionPayload {
                answers: snapshot.to_submitted(&self.questions),
                time_spent_seconds: ticket.time_spent_seconds,
            },
            local_score,
        };

        let sink = Arc::clone(&self.sink);
        match deliver(sink.as_ref(), &submission).await {
            Ok(breakdown) => {
                self.guard.complete();
                self.countdown.stop();
                let result = scoring::session_result(breakdown);
                tracing::info!(
                    session_id = %self.id,
                    ?trigger,
                    score = result.breakdown.total_score_percent,
                    level = %result.level,
                    "session submitted"
                );
                self.result = Some(result.clone());
                Ok(SubmitOutcome::Submitted(result))
            }
            Err(err) => {
                tracing::warn!(session_id = %self.id, ?trigger, error = %err, "submission failed");
                self.guard.rollback();
                self.ledger.restore(snapshot);
                Err(err.into())
            }
        }
    }
}

async fn deliver(
    sink: &dyn SubmissionSink,
    submission: &Submission,
) -> Result<ScoreBreakdown, SinkError> {
    let response = sink.submit(submission).await?;
    match (submission.grading, response, &submission.local_score) {
        (GradingMode::Local, _, Some(local)) => Ok(local.clone()),
        (_, SinkResponse::Graded(breakdown), _) => Ok(breakdown),
        _ => Err(SinkError::MissingScore),
    }
}
