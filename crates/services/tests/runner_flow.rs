use std::sync::Arc;
use std::time::Duration;

use exam_core::countdown::WarningThreshold;
use exam_core::model::{
    AssessmentSettings, Difficulty, GradingMode, Question, QuestionId, SessionState,
    SubmitTrigger,
};
use exam_core::time::fixed_clock;
use services::{
    AutosaveSession, IntervalTicker, RecordingSink, SessionCommand, SessionController,
    SessionEvent, SessionRunner,
};
use storage::repository::{InMemoryRepository, SubmissionRepository};
use tokio::time::Instant;

fn questions() -> Vec<Question> {
    vec![
        Question::mcq(
            QuestionId::new(1),
            "Which keyword declares a constant?",
            vec!["let".into(), "const".into(), "static mut".into()],
            1,
            "syntax",
            Difficulty::Easy,
        ),
        Question::mcq(
            QuestionId::new(2),
            "Which trait enables `?` on Option?",
            vec!["Try".into(), "From".into(), "Into".into()],
            0,
            "traits",
            Difficulty::Hard,
        ),
    ]
}

fn session(duration: u32, repo: &InMemoryRepository) -> AutosaveSession {
    let sink = RecordingSink::new(fixed_clock(), Arc::new(repo.clone()));
    AutosaveSession::ephemeral(SessionController::new(
        questions(),
        AssessmentSettings::new(duration, GradingMode::Local),
        fixed_clock(),
        Arc::new(sink),
    ))
}

#[tokio::test(start_paused = true)]
async fn expiry_auto_submits_through_the_runner() {
    let repo = InMemoryRepository::new();
    let (runner, commands, mut events) =
        SessionRunner::new(session(3, &repo), IntervalTicker::every_second());
    commands
        .send(SessionCommand::SetMcq {
            question_id: QuestionId::new(1),
            answer_index: Some(1),
        })
        .await
        .unwrap();

    let started = Instant::now();
    let handle = tokio::spawn(runner.run());
    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        seen.push(event);
    }
    let session = handle.await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(
        &seen[..6],
        &[
            SessionEvent::Tick { time_left_seconds: 2 },
            SessionEvent::Warning(WarningThreshold::FiveMinutes),
            SessionEvent::Warning(WarningThreshold::OneMinute),
            SessionEvent::Tick { time_left_seconds: 1 },
            SessionEvent::Tick { time_left_seconds: 0 },
            SessionEvent::Expired,
        ]
    );
    let Some(SessionEvent::Submitted(result)) = seen.get(6) else {
        panic!("expected submission after expiry, got {seen:?}");
    };
    assert_eq!(result.breakdown.total_score_percent, 50.0);
    assert_eq!(seen.len(), 7);

    let controller = session.controller();
    assert_eq!(controller.state(), SessionState::Submitted);
    let rows = repo.list_submissions(controller.id()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record.trigger, SubmitTrigger::Auto);
    assert_eq!(rows[0].record.payload.time_spent_seconds, 3);
}

#[tokio::test(start_paused = true)]
async fn declined_submit_can_be_confirmed() {
    let repo = InMemoryRepository::new();
    let (runner, commands, mut events) =
        SessionRunner::new(session(0, &repo), IntervalTicker::every_second());
    let handle = tokio::spawn(runner.run());

    commands
        .send(SessionCommand::SetMcq {
            question_id: QuestionId::new(2),
            answer_index: Some(0),
        })
        .await
        .unwrap();
    commands
        .send(SessionCommand::SetEssay {
            question_id: QuestionId::new(1),
            text: "const".into(),
        })
        .await
        .unwrap();
    commands.send(SessionCommand::Submit).await.unwrap();

    let rejected = events.recv().await.unwrap();
    assert!(matches!(
        rejected,
        SessionEvent::AnswerRejected { question_id, .. } if question_id == QuestionId::new(1)
    ));
    let SessionEvent::ConfirmDeclined { unanswered, message } = events.recv().await.unwrap() else {
        panic!("expected confirmation prompt");
    };
    assert_eq!(unanswered, 1);
    assert!(message.contains("1 unanswered of 2"));

    commands.send(SessionCommand::ConfirmSubmit).await.unwrap();
    let SessionEvent::Submitted(result) = events.recv().await.unwrap() else {
        panic!("expected submission");
    };
    assert_eq!(result.breakdown.total_score_percent, 50.0);

    let session = handle.await.unwrap();
    assert_eq!(session.controller().state(), SessionState::Submitted);
    assert_eq!(
        repo.list_submissions(session.controller().id())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn close_stops_the_countdown() {
    let repo = InMemoryRepository::new();
    let (runner, commands, mut events) =
        SessionRunner::new(session(600, &repo), IntervalTicker::every_second());
    let handle = tokio::spawn(runner.run());

    let first = events.recv().await.unwrap();
    assert_eq!(first, SessionEvent::Tick { time_left_seconds: 599 });
    commands.send(SessionCommand::Close).await.unwrap();

    let mut rest = Vec::new();
    while let Some(event) = events.recv().await {
        rest.push(event);
    }
    assert_eq!(rest.last(), Some(&SessionEvent::Closed));

    let session = handle.await.unwrap();
    assert!(!session.controller().is_ticking());
    assert_eq!(session.controller().state(), SessionState::InProgress);
}
