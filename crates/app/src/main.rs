mod command;

use std::fmt;

use prep_core::model::{SessionPhase, TestId, UserId};
use prep_core::{TickOutcome, Transition};
use services::{
    AppServices, Clock, LiveSession, SessionConfig, SessionError, SessionTicker,
    SessionWorkflowService,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use command::Command;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidTestId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user-id value: {raw}"),
            ArgsError::InvalidTestId { raw } => write!(f, "invalid --test-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

struct Args {
    db_url: String,
    user_id: UserId,
    test_id: TestId,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- take    [--db <sqlite_url>] [--user-id <id>] [--test-id <id>]");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>] [--user-id <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:dev.sqlite3");
    eprintln!("  --user-id 1");
    eprintln!("  --test-id 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PREP_DB_URL, PREP_USER_ID, PREP_TEST_ID, PREP__* session settings, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Take,
    History,
}

impl Mode {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("PREP_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:dev.sqlite3".into()), normalize_sqlite_url);
        let mut user_id = std::env::var("PREP_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or_else(|| UserId::new(1));
        let mut test_id = std::env::var("PREP_TEST_ID")
            .ok()
            .and_then(|value| value.parse::<TestId>().ok())
            .unwrap_or_else(|| TestId::new(1));

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user-id" => {
                    let value = require_value(args, "--user-id")?;
                    user_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                }
                "--test-id" => {
                    let value = require_value(args, "--test-id")?;
                    test_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidTestId { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            test_id,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
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

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn show_question(live: &LiveSession) {
    let state = live.state();
    let progress = live.progress();
    match state.phase() {
        SessionPhase::Break => {
            println!(
                "-- break: {} left (`skip` to continue) --",
                format_clock(state.remaining_seconds())
            );
            return;
        }
        SessionPhase::AwaitingScore => {
            println!("-- all modules submitted; `finish` to score --");
            return;
        }
        SessionPhase::Module => {}
    }

    let position = state.position();
    let Some(module) = live.test().module(position) else {
        return;
    };
    let index = state.current_question();
    let Some(question) = module.questions().get(index) else {
        return;
    };
    let key = position.question(index);

    println!(
        "[{} / {}] question {} of {}  {} left{}",
        progress.section_name,
        progress.module_name,
        index + 1,
        module.question_count(),
        format_clock(state.remaining_seconds()),
        if state.is_flagged(position, index) { "  [flagged]" } else { "" },
    );
    println!("{}", question.prompt());
    if let Some(image) = question.image() {
        println!("(image: {image})");
    }
    let selected = state.current_answers().get(index).map_or("", String::as_str);
    for (o, option) in question.options().iter().enumerate() {
        let mark = if selected == option.as_str() { '*' } else { ' ' };
        if state.is_struck(key, o) {
            println!(" {mark} {}. ~~{option}~~", o + 1);
        } else {
            println!(" {mark} {}. {option}", o + 1);
        }
    }
}

fn show_overview(workflow: &SessionWorkflowService, live: &LiveSession) {
    let overview = workflow.overview(live);
    println!(
        "module {}: {} of {} answered, {} flagged, {} left",
        overview.key,
        overview.answered,
        overview.questions.len(),
        overview.flagged,
        format_clock(overview.remaining_seconds)
    );
    for q in &overview.questions {
        println!(
            "  {:>2} {} {}{}",
            q.index + 1,
            if q.answered { "answered  " } else { "unanswered" },
            if q.flagged { "flagged " } else { "" },
            if q.struck > 0 {
                format!("({} struck)", q.struck)
            } else {
                String::new()
            }
        );
    }
}

fn announce(transition: Transition) {
    match transition {
        Transition::NextModule(key) => println!("-- module {key} started --"),
        Transition::BreakStarted { seconds } => {
            println!("-- break for {} --", format_clock(seconds));
        }
        Transition::NextSection(key) => println!("-- section {} started --", key.section + 1),
        Transition::ReadyToFinalize => println!("-- every module is submitted --"),
    }
}

//
// ─── DRIVER ────────────────────────────────────────────────────────────────────
//

/// Map a numeric answer to the option text; anything else is taken verbatim.
fn resolve_answer(live: &LiveSession, question: usize, value: String) -> String {
    let option = value
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|o| {
            live.test()
                .module(live.state().position())
                .and_then(|m| m.questions().get(question))
                .and_then(|q| q.options().get(o))
        });
    option.cloned().unwrap_or(value)
}

enum Flow {
    Continue,
    Exit,
}

async fn finish(workflow: &SessionWorkflowService, live: &mut LiveSession) -> Flow {
    match workflow.finalize(live).await {
        Ok(report) => {
            println!(
                "score: {} / {} ({:.2}%) in {}",
                report.score,
                report.total_questions,
                report.percentage,
                format_clock(report.time_taken_secs)
            );
            for review in report.reviews.iter().filter(|r| !r.is_correct) {
                println!(
                    "  missed {}.{} #{}: chose {:?}, correct {:?}",
                    review.key.module.section + 1,
                    review.key.module.module + 1,
                    review.key.question + 1,
                    review.selected,
                    review.correct_answer
                );
            }
            Flow::Exit
        }
        Err(err) if err.is_retryable() => {
            eprintln!("scoring failed ({err}); `finish` to retry");
            Flow::Continue
        }
        Err(err) => {
            eprintln!("{err}");
            Flow::Exit
        }
    }
}

async fn handle(
    workflow: &SessionWorkflowService,
    live: &mut LiveSession,
    command: Command,
) -> Result<Flow, SessionError> {
    match command {
        Command::Answer { question, value } => {
            let value = resolve_answer(live, question, value);
            workflow.answer(live, question, value)?;
            workflow.go_to_question(live, question)?;
            show_question(live);
        }
        Command::Clear { question } => {
            workflow.clear_answer(live, question)?;
            show_question(live);
        }
        Command::Flag { question } => {
            let flagged = workflow.toggle_review(live, question)?;
            println!("question {} {}", question + 1, if flagged { "flagged" } else { "unflagged" });
        }
        Command::Strike { question, option } => {
            workflow.toggle_strike(live, question, option)?;
            workflow.go_to_question(live, question)?;
            show_question(live);
        }
        Command::Goto { question } => {
            workflow.go_to_question(live, question)?;
            show_question(live);
        }
        Command::Next => {
            workflow.next_question(live)?;
            show_question(live);
        }
        Command::Prev => {
            workflow.previous_question(live)?;
            show_question(live);
        }
        Command::Show => show_question(live),
        Command::Overview => show_overview(workflow, live),
        Command::Submit => {
            let transition = workflow.submit_module(live).await?;
            announce(transition);
            if transition == Transition::ReadyToFinalize {
                return Ok(finish(workflow, live).await);
            }
            show_question(live);
        }
        Command::Skip => {
            announce(workflow.skip_break(live).await?);
            show_question(live);
        }
        Command::Save => {
            workflow.save_and_exit(live).await?;
            println!("progress saved; the timer resumes when you come back");
            return Ok(Flow::Exit);
        }
        Command::Finish => return Ok(finish(workflow, live).await),
        Command::Help => command::print_help(),
    }
    Ok(Flow::Continue)
}

async fn take(services: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let workflow = services.workflow();
    let mut live = workflow.open(args.user_id, args.test_id).await?;
    println!(
        "{} ({} questions). Type `help` for commands.",
        live.test().title(),
        live.test().total_questions()
    );
    show_question(&live);
    if live.state().phase() == SessionPhase::AwaitingScore {
        if let Flow::Exit = finish(&workflow, &mut live).await {
            return Ok(());
        }
    }

    let (ticker, mut ticks) = SessionTicker::every_second();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(_) = ticks.recv() => {
                if live.state().phase() == SessionPhase::AwaitingScore {
                    continue;
                }
                match workflow.tick(&mut live).await {
                    Ok(TickOutcome::Advanced(transition)) => {
                        announce(transition);
                        if transition == Transition::ReadyToFinalize {
                            if let Flow::Exit = finish(&workflow, &mut live).await {
                                break;
                            }
                        } else {
                            show_question(&live);
                        }
                    }
                    Ok(_) => {}
                    Err(err) if err.is_retryable() => {
                        tracing::warn!(error = %err, "checkpoint failed; will retry");
                    }
                    Err(err) => {
                        eprintln!("{err}");
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // stdin closed: keep the attempt resumable.
                    if let Err(err) = workflow.save_and_exit(&mut live).await {
                        eprintln!("could not save progress: {err}");
                    }
                    break;
                };
                match command::parse(&line) {
                    Ok(cmd) => match handle(&workflow, &mut live, cmd).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Exit) => break,
                        Err(SessionError::Conflict) => {
                            eprintln!("this attempt was continued elsewhere; restart to reload it");
                            break;
                        }
                        Err(err) => eprintln!("{err}"),
                    },
                    Err(command::CommandError::Empty) => {}
                    Err(err) => eprintln!("{err}"),
                }
            }
        }
    }

    ticker.stop();
    Ok(())
}

async fn history(services: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let items = services.submissions().history(args.user_id, 50).await?;
    if items.is_empty() {
        println!("no submissions for user {}", args.user_id);
        return Ok(());
    }
    for item in items {
        println!(
            "test {:>4}  {}  {:>3} / {:<3} {:>6.2}%  {}",
            item.test_id,
            item.submitted_at.format("%Y-%m-%d %H:%M"),
            item.score,
            item.total_questions,
            item.percentage,
            format_clock(item.time_taken_secs)
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let mode = match argv.first().map(String::as_str) {
        None => Mode::Take,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Mode::Take,
        Some(first) => Mode::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let args = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = SessionConfig::load()?;
    prepare_sqlite_file(&args.db_url)?;
    let services = AppServices::new_sqlite(&args.db_url, Clock::default_clock(), config).await?;

    match mode {
        Mode::Take => take(&services, &args).await,
        Mode::History => history(&services, &args).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
