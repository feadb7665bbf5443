//! Host event loop for a single session.
//!
//! Ticks and learner commands are multiplexed into one task, so the countdown
//! and the submit button never touch the session concurrently. The loop ends
//! when the session is submitted, closed, or every command sender is dropped;
//! the ticker is dropped with it.

use exam_core::countdown::{ClockEvent, WarningThreshold};
use exam_core::guard::ConfirmRequest;
use exam_core::ledger::EditOutcome;
use exam_core::model::{QuestionId, SessionResult, SubmitTrigger};
use tokio::sync::mpsc;

use crate::error::SessionError;

use super::autosave::AutosaveSession;
use super::controller::SubmitOutcome;
use super::ticker::Ticker;

const CHANNEL_CAPACITY: usize = 64;

/// Learner input forwarded to the running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SetMcq {
        question_id: QuestionId,
        answer_index: Option<usize>,
    },
    SetEssay {
        question_id: QuestionId,
        text: String,
    },
    ClearAnswer(QuestionId),
    ExtendTime(u32),
    /// Submit, asking first if questions are unanswered.
    Submit,
    /// Submit even with unanswered questions.
    ConfirmSubmit,
    Close,
}

/// Things the host should show.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Tick { time_left_seconds: u32 },
    Warning(WarningThreshold),
    Expired,
    AnswerRejected {
        question_id: QuestionId,
        outcome: EditOutcome,
    },
    /// A manual submit stopped at the confirmation step.
    ConfirmDeclined { unanswered: usize, message: String },
    SubmitDisabled,
    SubmitFailed { message: String },
    AutosaveFailed { message: String },
    Submitted(SessionResult),
    Closed,
}

enum Step {
    Tick,
    Command(Option<SessionCommand>),
}

pub struct SessionRunner<T> {
    session: AutosaveSession,
    ticker: T,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::Sender<SessionEvent>,
    finished: bool,
}

impl<T: Ticker> SessionRunner<T> {
    /// Build a runner plus the command sender and event receiver the host uses.
    #[must_use]
    pub fn new(
        session: AutosaveSession,
        ticker: T,
    ) -> (Self, mpsc::Sender<SessionCommand>, mpsc::Receiver<SessionEvent>) {
        let (command_tx, commands) = mpsc::channel(CHANNEL_CAPACITY);
        let (events, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let runner = Self {
            session,
            ticker,
            commands,
            events,
            finished: false,
        };
        (runner, command_tx, event_rx)
    }

    /// Drive the session until it is submitted or closed, then hand it back.
    pub async fn run(mut self) -> AutosaveSession {
        while !self.finished {
            let ticking = self.session.controller().is_ticking();
            let step = tokio::select! {
                () = self.ticker.tick(), if ticking => Step::Tick,
                command = self.commands.recv() => Step::Command(command),
            };
            match step {
                Step::Tick => self.on_tick().await,
                Step::Command(Some(command)) => self.on_command(command).await,
                Step::Command(None) => self.close().await,
            }
        }
        self.session
    }

    async fn on_tick(&mut self) {
        let report = self.session.tick().await;
        for event in report.events {
            let event = match event {
                ClockEvent::Tick { time_left_seconds } => SessionEvent::Tick { time_left_seconds },
                ClockEvent::Warning(threshold) => SessionEvent::Warning(threshold),
                ClockEvent::Expired => SessionEvent::Expired,
            };
            self.emit(event).await;
        }
        if let Some(outcome) = report.submission {
            self.on_submit_outcome(outcome).await;
        }
    }

    async fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetMcq {
                question_id,
                answer_index,
            } => {
                let result = self.session.set_mcq_answer(question_id, answer_index).await;
                self.on_edit(question_id, result).await;
            }
            SessionCommand::SetEssay { question_id, text } => {
                let result = self.session.set_essay_answer(question_id, text).await;
                self.on_edit(question_id, result).await;
            }
            SessionCommand::ClearAnswer(question_id) => {
                let result = self.session.clear_answer(question_id).await;
                self.on_edit(question_id, result).await;
            }
            SessionCommand::ExtendTime(seconds) => self.session.extend_time(seconds),
            SessionCommand::Submit => {
                let outcome = self.session.request_submit(SubmitTrigger::Manual, &decline).await;
                self.on_submit_outcome(outcome).await;
            }
            SessionCommand::ConfirmSubmit => {
                let outcome = self.session.request_submit(SubmitTrigger::Manual, &approve).await;
                self.on_submit_outcome(outcome).await;
            }
            SessionCommand::Close => self.close().await,
        }
    }

    async fn on_edit(&mut self, question_id: QuestionId, result: Result<EditOutcome, SessionError>) {
        match result {
            Ok(outcome) if outcome.is_applied() => {}
            Ok(outcome) => {
                self.emit(SessionEvent::AnswerRejected {
                    question_id,
                    outcome,
                })
                .await;
            }
            Err(err) => {
                tracing::warn!(%question_id, error = %err, "autosave failed");
                self.emit(SessionEvent::AutosaveFailed {
                    message: err.to_string(),
                })
                .await;
            }
        }
    }

    async fn on_submit_outcome(&mut self, outcome: Result<SubmitOutcome, SessionError>) {
        let event = match outcome {
            Ok(SubmitOutcome::Submitted(result)) => {
                self.finished = true;
                SessionEvent::Submitted(result)
            }
            Ok(SubmitOutcome::Ignored) => return,
            Ok(SubmitOutcome::Disabled) => SessionEvent::SubmitDisabled,
            Ok(SubmitOutcome::Declined { unanswered }) => {
                let total = self.session.controller().questions().len();
                SessionEvent::ConfirmDeclined {
                    unanswered,
                    message: ConfirmRequest { unanswered, total }.message(),
                }
            }
            Err(err) => SessionEvent::SubmitFailed {
                message: err.to_string(),
            },
        };
        self.emit(event).await;
    }

    async fn close(&mut self) {
        self.session.close();
        self.finished = true;
        self.emit(SessionEvent::Closed).await;
    }

    async fn emit(&mut self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("session event receiver dropped");
        }
    }
}

fn decline(_: &ConfirmRequest) -> bool {
    false
}

fn approve(_: &ConfirmRequest) -> bool {
    true
}
