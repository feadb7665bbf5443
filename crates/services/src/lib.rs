#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;
pub mod sinks;
pub mod sources;

pub use exam_core::Clock;

pub use error::{SessionError, SinkError, SourceError};
pub use sinks::{HttpSinkConfig, HttpSubmissionSink, RecordingSink, SinkResponse, Submission, SubmissionSink};
pub use sources::{JsonFileQuestionSource, QuestionSource, StaticQuestionSource};

pub use sessions::{
    AssessmentService, AutosaveSession, IntervalTicker, SessionCommand, SessionController,
    SessionEvent, SessionRunner, SubmitOutcome, TickReport, Ticker,
};
