mod answer;
mod ids;
mod question;
mod score;
mod session;

pub use answer::{Answer, SubmissionPayload, SubmittedAnswer};
pub use ids::{AssessmentId, ParseIdError, QuestionId, SessionId};
pub use question::{Difficulty, Question, QuestionError, QuestionKind, validate_question_set};
pub use score::{
    DifficultyScores, ProficiencyLevel, Recommendation, ScoreBreakdown, SessionResult,
    TopicScore, WrongAnswer,
};
pub use session::{AssessmentSettings, GradingMode, SessionProgress, SessionState, SubmitTrigger};
