use std::fmt;
use std::path::PathBuf;

use prep_core::model::{
    ModuleDraft, QuestionDraft, SectionDraft, TestDefinitionDraft, TestId, TestKind,
};
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    test_id: TestId,
    title: String,
    kind: TestKind,
    questions: u32,
    file: Option<PathBuf>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidTestId { raw: String },
    InvalidKind { raw: String },
    InvalidQuestions { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTestId { raw } => write!(f, "invalid --test-id value: {raw}"),
            ArgsError::InvalidKind { raw } => {
                write!(f, "invalid --kind value (expected sat or gre): {raw}")
            }
            ArgsError::InvalidQuestions { raw } => {
                write!(f, "invalid --questions value (expected 1..=50): {raw}")
            }
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

fn parse_kind(raw: &str) -> Result<TestKind, ArgsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "sat" => Ok(TestKind::Sat),
        "gre" => Ok(TestKind::Gre),
        _ => Err(ArgsError::InvalidKind { raw: raw.into() }),
    }
}

fn parse_questions(raw: &str) -> Result<u32, ArgsError> {
    match raw.parse::<u32>() {
        Ok(n) if (1..=50).contains(&n) => Ok(n),
        _ => Err(ArgsError::InvalidQuestions { raw: raw.into() }),
    }
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PREP_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3?mode=rwc".into());
        let mut test_id = std::env::var("PREP_TEST_ID")
            .ok()
            .and_then(|value| value.parse::<TestId>().ok())
            .unwrap_or_else(|| TestId::new(1));
        let mut title =
            std::env::var("PREP_TEST_TITLE").unwrap_or_else(|_| "Practice Test 1".into());
        let mut kind = TestKind::Sat;
        let mut questions = 4;
        let mut file = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--test-id" => {
                    let value = require_value(&mut args, "--test-id")?;
                    test_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidTestId { raw: value.clone() })?;
                }
                "--title" => title = require_value(&mut args, "--title")?,
                "--kind" => kind = parse_kind(&require_value(&mut args, "--kind")?)?,
                "--questions" => {
                    questions = parse_questions(&require_value(&mut args, "--questions")?)?;
                }
                "--file" => file = Some(PathBuf::from(require_value(&mut args, "--file")?)),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            test_id,
            title,
            kind,
            questions,
            file,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3?mode=rwc)");
    eprintln!("  --test-id <id>            Test id to upsert (default: 1)");
    eprintln!("  --title <text>            Test title (default: Practice Test 1)");
    eprintln!("  --kind <sat|gre>          Test layout to generate (default: sat)");
    eprintln!("  --questions <n>           Questions per module, 1..=50 (default: 4)");
    eprintln!("  --file <path>             Load a test definition from JSON instead");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  PREP_DB_URL, PREP_TEST_ID, PREP_TEST_TITLE");
}

const SAMPLE_QUESTIONS: [(&str, [&str; 4], &str); 4] = [
    (
        "Which choice completes the text with the most logical transition?",
        ["However", "Therefore", "Similarly", "For instance"],
        "However",
    ),
    (
        "If 3x + 5 = 20, what is the value of x?",
        ["3", "5", "15", "25"],
        "5",
    ),
    (
        "Which word is closest in meaning to \"ephemeral\"?",
        ["lasting", "fleeting", "hidden", "serene"],
        "fleeting",
    ),
    (
        "A circle has radius 4. What is its area?",
        ["8pi", "12pi", "16pi", "64pi"],
        "16pi",
    ),
];

fn module(name: &str, timer_seconds: u32, questions: u32, offset: usize) -> ModuleDraft {
    let questions = (0..questions as usize)
        .map(|i| {
            let (prompt, options, correct) = SAMPLE_QUESTIONS[(i + offset) % SAMPLE_QUESTIONS.len()];
            let mut draft = QuestionDraft::new(prompt, &options, correct);
            draft.explanation = Some(format!("The correct answer is {correct}."));
            draft
        })
        .collect();
    ModuleDraft {
        name: name.into(),
        timer_seconds,
        questions,
    }
}

fn generated(args: &Args) -> TestDefinitionDraft {
    let sections = match args.kind {
        TestKind::Sat => vec![
            SectionDraft {
                name: "Reading and Writing".into(),
                break_seconds: 600,
                modules: vec![
                    module("Module 1", 1920, args.questions, 0),
                    module("Module 2", 1920, args.questions, 2),
                ],
            },
            SectionDraft {
                name: "Math".into(),
                break_seconds: 0,
                modules: vec![
                    module("Module 1", 2100, args.questions, 1),
                    module("Module 2", 2100, args.questions, 3),
                ],
            },
        ],
        TestKind::Gre => vec![
            SectionDraft {
                name: "Verbal Reasoning".into(),
                break_seconds: 60,
                modules: vec![
                    module("Section 1", 1080, args.questions, 0),
                    module("Section 2", 1380, args.questions, 2),
                ],
            },
            SectionDraft {
                name: "Quantitative Reasoning".into(),
                break_seconds: 0,
                modules: vec![
                    module("Section 1", 1260, args.questions, 1),
                    module("Section 2", 1560, args.questions, 3),
                ],
            },
        ],
    };

    TestDefinitionDraft {
        id: args.test_id,
        title: args.title.clone(),
        kind: args.kind,
        sections,
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let draft = match &args.file {
        Some(path) => serde_json::from_str::<TestDefinitionDraft>(&std::fs::read_to_string(path)?)?,
        None => generated(&args),
    };
    let test = draft.validate()?;

    let storage = Storage::sqlite(&args.db_url).await?;
    storage.tests.upsert_test(&test).await?;
    tracing::info!(test_id = %test.id(), "seeded test definition");

    println!(
        "Seeded test {} ({} questions) into {}",
        test.id(),
        test.total_questions(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
