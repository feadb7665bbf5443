use serde::{Deserialize, Serialize};
use std::fmt;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of one exam-taking attempt.
///
/// Forward transitions only, except the rollback from `Submitting` to
/// `InProgress` when the downstream step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    InProgress,
    Submitting,
    Submitted,
}

impl SessionState {
    #[must_use]
    pub fn is_in_progress(self) -> bool {
        matches!(self, SessionState::InProgress)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::InProgress => "in_progress",
            SessionState::Submitting => "submitting",
            SessionState::Submitted => "submitted",
        };
        f.write_str(s)
    }
}

/// What asked for the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmitTrigger {
    /// The learner pressed submit.
    Manual,
    /// The countdown expired.
    Auto,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Where a finished session gets graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradingMode {
    /// Grade in-process; the sink only stores the result.
    #[default]
    Local,
    /// The sink grades and returns the breakdown.
    Server,
}

/// Per-assessment session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssessmentSettings {
    duration_seconds: u32,
    grading: GradingMode,
}

impl AssessmentSettings {
    /// `duration_seconds == 0` means untimed.
    #[must_use]
    pub fn new(duration_seconds: u32, grading: GradingMode) -> Self {
        Self {
            duration_seconds,
            grading,
        }
    }

    #[must_use]
    pub fn untimed(grading: GradingMode) -> Self {
        Self::new(0, grading)
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    #[must_use]
    pub fn is_timed(&self) -> bool {
        self.duration_seconds > 0
    }

    #[must_use]
    pub fn grading(&self) -> GradingMode {
        self.grading
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub time_left_seconds: u32,
    pub state: SessionState,
}
