use std::fmt;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use exam_core::model::{
    AssessmentId, AssessmentSettings, GradingMode, Question, QuestionId, QuestionKind,
    SessionId, SessionResult,
};
use services::{
    AssessmentService, AutosaveSession, Clock, HttpSubmissionSink, IntervalTicker,
    JsonFileQuestionSource, RecordingSink, SessionCommand, SessionEvent, SessionRunner,
    SubmissionSink,
};
use storage::repository::Storage;
use tokio::sync::mpsc;

const DEFAULT_DURATION_SECONDS: u32 = 30 * 60;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDuration { raw: String },
    InvalidDbUrl { raw: String },
    InvalidSessionId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDuration { raw } => write!(f, "invalid --duration value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSessionId { raw } => write!(f, "invalid --resume value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url|memory>] [--questions <dir>]");
    eprintln!("                      [--assessment <id>] [--duration <seconds>]");
    eprintln!("                      [--server-grading] [--resume <session_id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:exam.sqlite3");
    eprintln!("  --questions questions");
    eprintln!("  --assessment sample");
    eprintln!("  --duration {DEFAULT_DURATION_SECONDS}  (0 = untimed)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_QUESTIONS_DIR, EXAM_ASSESSMENT, EXAM_DURATION_SECS,");
    eprintln!("  EXAM_SINK_URL, EXAM_SINK_TOKEN, RUST_LOG");
}

fn print_commands() {
    println!("Commands:");
    println!("  a <question> <option>   choose an option (letter or 1-based number)");
    println!("  e <question> <text>     write an essay answer");
    println!("  c <question>            clear an answer");
    println!("  x <seconds>             extend the time limit");
    println!("  submit                  submit (asks if answers are missing)");
    println!("  yes                     submit anyway");
    println!("  quit                    close without submitting (draft is kept)");
}

struct Args {
    db_url: Option<String>,
    questions_dir: PathBuf,
    assessment: AssessmentId,
    duration_seconds: u32,
    server_grading: bool,
    resume: Option<SessionId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://exam.sqlite3".into(), normalize_sqlite_url);
        let mut questions_dir = std::env::var("EXAM_QUESTIONS_DIR")
            .map_or_else(|_| PathBuf::from("questions"), PathBuf::from);
        let mut assessment = std::env::var("EXAM_ASSESSMENT")
            .map_or_else(|_| AssessmentId::new("sample"), AssessmentId::new);
        let mut duration_seconds = std::env::var("EXAM_DURATION_SECS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(DEFAULT_DURATION_SECONDS);
        let mut server_grading = false;
        let mut resume = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--questions" => {
                    questions_dir = PathBuf::from(require_value(args, "--questions")?);
                }
                "--assessment" => {
                    assessment = AssessmentId::new(require_value(args, "--assessment")?);
                }
                "--duration" => {
                    let value = require_value(args, "--duration")?;
                    duration_seconds = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidDuration { raw: value.clone() })?;
                }
                "--server-grading" => server_grading = true,
                "--resume" => {
                    let value = require_value(args, "--resume")?;
                    let parsed = value
                        .parse::<SessionId>()
                        .map_err(|_| ArgsError::InvalidSessionId { raw: value.clone() })?;
                    resume = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url: (db_url != "memory").then_some(db_url),
            questions_dir,
            assessment,
            duration_seconds,
            server_grading,
            resume,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "memory" || raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Turn one line of learner input into a session command.
fn parse_command(line: &str) -> Option<SessionCommand> {
    let line = line.trim();
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match verb {
        "a" => {
            let (id, choice) = rest.split_once(' ')?;
            Some(SessionCommand::SetMcq {
                question_id: id.trim().parse().ok()?,
                answer_index: Some(parse_option(choice.trim())?),
            })
        }
        "e" => {
            let (id, text) = rest.split_once(' ').unwrap_or((rest, ""));
            Some(SessionCommand::SetEssay {
                question_id: id.trim().parse().ok()?,
                text: text.to_owned(),
            })
        }
        "c" => Some(SessionCommand::ClearAnswer(rest.parse::<QuestionId>().ok()?)),
        "x" => Some(SessionCommand::ExtendTime(rest.parse().ok()?)),
        "submit" => Some(SessionCommand::Submit),
        "yes" => Some(SessionCommand::ConfirmSubmit),
        "quit" | "q" => Some(SessionCommand::Close),
        _ => None,
    }
}

/// `"B"`, `"b"` and `"2"` all select the second option.
fn parse_option(raw: &str) -> Option<usize> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            Some(usize::from(letter.to_ascii_uppercase() as u8 - b'A'))
        }
        _ => raw.parse::<usize>().ok()?.checked_sub(1),
    }
}

fn print_questions(questions: &[Question]) {
    for question in questions {
        println!();
        println!(
            "[{}] ({}, {}) {}",
            question.id,
            question.topic,
            question.difficulty.as_str(),
            question.stem
        );
        match &question.kind {
            QuestionKind::Mcq { options, .. } => {
                for (letter, option) in ('A'..='Z').zip(options) {
                    println!("    {letter}. {option}");
                }
            }
            QuestionKind::Essay { .. } => println!("    (essay)"),
        }
    }
    println!();
}

fn print_result(result: &SessionResult) {
    let breakdown = &result.breakdown;
    println!();
    println!(
        "Score: {}% ({})",
        breakdown.total_score_percent,
        result.level.label()
    );
    println!("Time spent: {}s", breakdown.time_spent_seconds);
    for (topic, score) in &breakdown.topics {
        println!("  {topic}: {}", score.score);
    }
    for wrong in &breakdown.wrong_answers {
        println!();
        println!("  [{}] {}", wrong.question_id, wrong.question);
        println!("      correct: {}", wrong.correct_answer_description);
        if !wrong.explanation.is_empty() {
            println!("      {}", wrong.explanation);
        }
    }
    println!();
    for recommendation in &result.recommendations {
        println!("  - {}", recommendation.message);
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Tick { time_left_seconds } => {
            if time_left_seconds % 60 == 0 || *time_left_seconds <= 10 {
                println!("{}:{:02} left", time_left_seconds / 60, time_left_seconds % 60);
            }
        }
        SessionEvent::Warning(threshold) => println!("Warning: {threshold}"),
        SessionEvent::Expired => println!("Time is up. Submitting..."),
        SessionEvent::AnswerRejected {
            question_id,
            outcome,
        } => println!("Answer for {question_id} not saved: {outcome:?}"),
        SessionEvent::ConfirmDeclined { message, .. } => {
            println!("{message} Type `yes` to submit.");
        }
        SessionEvent::SubmitDisabled => println!("This assessment has no questions to submit."),
        SessionEvent::SubmitFailed { message } => {
            println!("Submission failed: {message}. Type `submit` to retry.");
        }
        SessionEvent::AutosaveFailed { message } => println!("Draft not saved: {message}"),
        SessionEvent::Submitted(result) => print_result(result),
        SessionEvent::Closed => println!("Session closed."),
    }
}

/// Forward parsed input lines until input ends or the session stops listening.
fn forward_commands(input: impl BufRead, commands: &mpsc::Sender<SessionCommand>) {
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(command) => {
                if commands.blocking_send(command).is_err() {
                    break;
                }
            }
            None => print_commands(),
        }
    }
}

// A plain thread, not a runtime task: a pending stdin read must not keep the
// runtime from shutting down once the session ends.
fn spawn_stdin_reader(commands: mpsc::Sender<SessionCommand>) {
    std::thread::spawn(move || forward_commands(std::io::stdin().lock(), &commands));
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    let storage = match &parsed.db_url {
        Some(db_url) => {
            prepare_sqlite_file(db_url)?;
            Storage::sqlite(db_url).await?
        }
        None => Storage::in_memory(),
    };

    let clock = Clock::default_clock();
    let http = HttpSubmissionSink::from_env();
    let grading = if parsed.server_grading && http.enabled() {
        GradingMode::Server
    } else {
        if parsed.server_grading {
            tracing::warn!("--server-grading needs EXAM_SINK_URL; grading locally");
        }
        GradingMode::Local
    };
    let mut recording = RecordingSink::new(clock, Arc::clone(&storage.submissions));
    if http.enabled() {
        recording = recording.with_upstream(Arc::new(http));
    }
    let sink: Arc<dyn SubmissionSink> = Arc::new(recording);

    let service = AssessmentService::new(
        clock,
        Arc::new(JsonFileQuestionSource::new(parsed.questions_dir.clone())),
        sink,
    )
    .with_drafts(Arc::clone(&storage.drafts))
    .with_submissions(Arc::clone(&storage.submissions));
    let settings = AssessmentSettings::new(parsed.duration_seconds, grading);

    let session: AutosaveSession = match parsed.resume {
        Some(session_id) => {
            let (session, restored) = service
                .resume(&parsed.assessment, settings, session_id)
                .await?;
            println!("Resumed {session_id} with {restored} saved answer(s).");
            session
        }
        None => service.start(&parsed.assessment, settings).await?,
    };

    let controller = session.controller();
    println!(
        "Assessment {} | session {} | {} question(s) | {}",
        parsed.assessment,
        controller.id(),
        controller.questions().len(),
        if settings.is_timed() {
            format!("{}s", settings.duration_seconds())
        } else {
            "untimed".to_owned()
        }
    );
    print_questions(controller.questions());
    print_commands();

    let (runner, commands, mut events) = SessionRunner::new(session, IntervalTicker::every_second());
    let handle = tokio::spawn(runner.run());
    spawn_stdin_reader(commands);

    while let Some(event) = events.recv().await {
        print_event(&event);
    }
    let session = handle.await?;
    tracing::info!(
        session_id = %session.controller().id(),
        state = %session.controller().state(),
        "session finished"
    );
    Ok(())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse_command("a 3 b"),
            Some(SessionCommand::SetMcq {
                question_id: QuestionId::new(3),
                answer_index: Some(1),
            })
        );
        assert_eq!(
            parse_command("a 3 4"),
            Some(SessionCommand::SetMcq {
                question_id: QuestionId::new(3),
                answer_index: Some(3),
            })
        );
        assert_eq!(
            parse_command("e 2 ownership and borrowing"),
            Some(SessionCommand::SetEssay {
                question_id: QuestionId::new(2),
                text: "ownership and borrowing".into(),
            })
        );
        assert_eq!(parse_command("x 60"), Some(SessionCommand::ExtendTime(60)));
        assert_eq!(parse_command("submit"), Some(SessionCommand::Submit));
        assert_eq!(parse_command("a 3"), None);
        assert_eq!(parse_command("dance"), None);
    }

    #[test]
    fn forwards_input_until_the_session_stops_listening() {
        let (tx, mut rx) = mpsc::channel(8);
        forward_commands(std::io::Cursor::new("a 1 b\n\nwhat\nsubmit\n"), &tx);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionCommand::SetMcq {
                question_id: QuestionId::new(1),
                answer_index: Some(1),
            }
        );
        assert_eq!(rx.try_recv().unwrap(), SessionCommand::Submit);
        assert!(rx.try_recv().is_err());

        drop(rx);
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        // Returns instead of blocking once the runner is gone.
        forward_commands(std::io::Cursor::new("submit\nyes\n"), &tx);
    }

    #[test]
    fn option_parsing() {
        assert_eq!(parse_option("A"), Some(0));
        assert_eq!(parse_option("d"), Some(3));
        assert_eq!(parse_option("1"), Some(0));
        assert_eq!(parse_option("0"), None);
    }

    #[test]
    fn memory_db_is_kept_verbatim() {
        assert_eq!(normalize_sqlite_url("memory".into()), "memory");
        assert!(normalize_sqlite_url("exam.sqlite3".into()).starts_with("sqlite:///"));
    }
}
