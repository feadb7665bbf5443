mod autosave;
mod controller;
mod runner;
mod ticker;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use autosave::AutosaveSession;
pub use controller::{SessionController, SubmitOutcome, TickReport};
pub use runner::{SessionCommand, SessionEvent, SessionRunner};
pub use ticker::{IntervalTicker, Ticker};
pub use workflow::AssessmentService;
