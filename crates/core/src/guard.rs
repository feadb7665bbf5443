//! At-most-once submission.
//!
//! The manual submit button and countdown expiry can both ask to submit. The
//! guard owns the session state and performs the `InProgress -> Submitting`
//! move as a single compare-and-set, so whichever request lands second sees a
//! non-`InProgress` state and is ignored.

use chrono::{DateTime, Utc};

use crate::model::{SessionState, SubmitTrigger};
use crate::time::Clock;

//
// ─── CONFIRMATION PORT ─────────────────────────────────────────────────────────
//

/// Asks the learner whether to submit with questions left unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub unanswered: usize,
    pub total: usize,
}

impl ConfirmRequest {
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "{} unanswered of {} questions. Submit anyway?",
            self.unanswered, self.total
        )
    }
}

/// Injectable confirmation dialog.
pub trait ConfirmPort: Send + Sync {
    fn confirm(&self, request: &ConfirmRequest) -> bool;
}

impl<F> ConfirmPort for F
where
    F: Fn(&ConfirmRequest) -> bool + Send + Sync,
{
    fn confirm(&self, request: &ConfirmRequest) -> bool {
        self(request)
    }
}

//
// ─── DECISIONS ─────────────────────────────────────────────────────────────────
//

/// Permission to run the downstream submission step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTicket {
    pub trigger: SubmitTrigger,
    pub time_spent_seconds: u64,
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SubmitDecision {
    /// The session moved to `Submitting`; the caller must finish with
    /// `complete` or `rollback`.
    Proceed(SubmitTicket),
    /// Already submitting or submitted.
    Ignored,
    /// The question set cannot be submitted.
    Disabled,
    /// The learner declined the incomplete-submission prompt.
    Declined { unanswered: usize },
}

//
// ─── GUARD ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
pub struct SubmissionGuard {
    state: SessionState,
    started_at: DateTime<Utc>,
    submittable: bool,
    attempts: u32,
}

impl SubmissionGuard {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, submittable: bool) -> Self {
        Self {
            state: SessionState::InProgress,
            started_at,
            submittable,
            attempts: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn is_submittable(&self) -> bool {
        self.submittable
    }

    /// Number of submissions that got past the guard, including rolled back ones.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Decide whether a submission may start, and if so start it.
    ///
    /// `answered`/`total` drive the incomplete-answer prompt for manual
    /// submissions; automatic submissions never prompt. Time spent is measured
    /// on `clock` from the guard's start time.
    pub fn request_submit(
        &mut self,
        trigger: SubmitTrigger,
        answered: usize,
        total: usize,
        confirm: &dyn ConfirmPort,
        clock: &Clock,
    ) -> SubmitDecision {
        if !self.state.is_in_progress() {
            tracing::debug!(state = %self.state, ?trigger, "duplicate submit ignored");
            return SubmitDecision::Ignored;
        }
        if !self.submittable {
            return SubmitDecision::Disabled;
        }

        if trigger == SubmitTrigger::Manual && answered < total {
            let request = ConfirmRequest {
                unanswered: total - answered,
                total,
            };
            if !confirm.confirm(&request) {
                return SubmitDecision::Declined {
                    unanswered: request.unanswered,
                };
            }
        }

        if !self.transition(SessionState::InProgress, SessionState::Submitting) {
            return SubmitDecision::Ignored;
        }

        self.attempts = self.attempts.saturating_add(1);
        let ticket = SubmitTicket {
            trigger,
            time_spent_seconds: clock.seconds_since(self.started_at),
            attempt: self.attempts,
        };
        tracing::info!(
            ?trigger,
            attempt = ticket.attempt,
            time_spent = ticket.time_spent_seconds,
            "submission started"
        );
        SubmitDecision::Proceed(ticket)
    }

    /// `Submitting -> Submitted`. Returns false if not submitting.
    pub fn complete(&mut self) -> bool {
        self.transition(SessionState::Submitting, SessionState::Submitted)
    }

    /// `Submitting -> InProgress` after a failed downstream step.
    pub fn rollback(&mut self) -> bool {
        let rolled_back = self.transition(SessionState::Submitting, SessionState::InProgress);
        if rolled_back {
            tracing::warn!(attempt = self.attempts, "submission rolled back");
        }
        rolled_back
    }

    fn transition(&mut self, from: SessionState, to: SessionState) -> bool {
        if self.state != from {
            return false;
        }
        self.state = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{fixed_clock, fixed_now};
    use chrono::Duration;
    use std::sync::Mutex;

    fn approve(_: &ConfirmRequest) -> bool {
        true
    }

    fn decline(_: &ConfirmRequest) -> bool {
        false
    }

    #[test]
    fn second_request_is_ignored_while_submitting_and_after() {
        let start = fixed_now();
        let mut guard = SubmissionGuard::new(start, true);
        let now = Clock::fixed(start + Duration::seconds(42));

        let first = guard.request_submit(SubmitTrigger::Manual, 3, 3, &approve, &now);
        let SubmitDecision::Proceed(ticket) = first else {
            panic!("expected proceed, got {first:?}");
        };
        assert_eq!(ticket.time_spent_seconds, 42);
        assert_eq!(guard.state(), SessionState::Submitting);

        let racing = guard.request_submit(SubmitTrigger::Auto, 3, 3, &approve, &now);
        assert_eq!(racing, SubmitDecision::Ignored);

        assert!(guard.complete());
        assert!(!guard.complete());
        assert_eq!(guard.state(), SessionState::Submitted);
        assert_eq!(
            guard.request_submit(SubmitTrigger::Manual, 3, 3, &approve, &now),
            SubmitDecision::Ignored
        );
        assert_eq!(guard.attempts(), 1);
    }

    #[test]
    fn manual_incomplete_asks_and_decline_keeps_in_progress() {
        let mut guard = SubmissionGuard::new(fixed_now(), true);
        let asked = Mutex::new(None);
        let confirm = |req: &ConfirmRequest| {
            *asked.lock().unwrap() = Some(*req);
            false
        };
        let decision = guard.request_submit(SubmitTrigger::Manual, 1, 5, &confirm, &fixed_clock());
        assert_eq!(decision, SubmitDecision::Declined { unanswered: 4 });
        let req = asked.lock().unwrap().expect("confirmation requested");
        assert_eq!(req.unanswered, 4);
        assert!(req.message().contains("4 unanswered"));
        assert_eq!(guard.state(), SessionState::InProgress);
        assert_eq!(guard.attempts(), 0);
    }

    #[test]
    fn auto_submit_skips_confirmation() {
        let mut guard = SubmissionGuard::new(fixed_now(), true);
        let decision = guard.request_submit(SubmitTrigger::Auto, 0, 5, &decline, &fixed_clock());
        assert!(matches!(decision, SubmitDecision::Proceed(t) if t.trigger == SubmitTrigger::Auto));
    }

    #[test]
    fn non_submittable_session_is_disabled() {
        let mut guard = SubmissionGuard::new(fixed_now(), false);
        assert_eq!(
            guard.request_submit(SubmitTrigger::Manual, 0, 0, &approve, &fixed_clock()),
            SubmitDecision::Disabled
        );
        assert_eq!(guard.state(), SessionState::InProgress);
    }

    #[test]
    fn rollback_allows_retry_and_clamps_elapsed() {
        let start = fixed_now();
        let mut guard = SubmissionGuard::new(start, true);
        let earlier = Clock::fixed(start - Duration::seconds(10));
        let SubmitDecision::Proceed(ticket) =
            guard.request_submit(SubmitTrigger::Manual, 1, 1, &approve, &earlier)
        else {
            panic!("expected proceed");
        };
        assert_eq!(ticket.time_spent_seconds, 0);
        assert!(guard.rollback());
        assert!(!guard.rollback());
        assert_eq!(guard.state(), SessionState::InProgress);

        let retry = guard.request_submit(SubmitTrigger::Manual, 1, 1, &approve, &Clock::fixed(start));
        assert!(matches!(retry, SubmitDecision::Proceed(t) if t.attempt == 2));
    }
}
