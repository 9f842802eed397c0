//! Line commands understood by the console driver.
//!
//! Question and option numbers are 1-based on the console and 0-based inside
//! the session.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Answer { question: usize, value: String },
    Clear { question: usize },
    Flag { question: usize },
    Strike { question: usize, option: usize },
    Goto { question: usize },
    Next,
    Prev,
    Show,
    Overview,
    Submit,
    Skip,
    Save,
    Finish,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    MissingArgument { command: &'static str, argument: &'static str },
    InvalidNumber { raw: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::Unknown(word) => write!(f, "unknown command: {word} (try `help`)"),
            CommandError::MissingArgument { command, argument } => {
                write!(f, "{command} requires <{argument}>")
            }
            CommandError::InvalidNumber { raw } => {
                write!(f, "expected a number starting at 1, got {raw:?}")
            }
        }
    }
}

impl std::error::Error for CommandError {}

fn index(
    raw: Option<&str>,
    command: &'static str,
    argument: &'static str,
) -> Result<usize, CommandError> {
    let raw = raw.ok_or(CommandError::MissingArgument { command, argument })?;
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(CommandError::InvalidNumber { raw: raw.into() }),
    }
}

/// Parse one input line.
///
/// # Errors
///
/// Returns `CommandError` for blank lines, unknown words and bad arguments.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    match word.to_ascii_lowercase().as_str() {
        "" => Err(CommandError::Empty),
        "answer" | "a" => {
            let question = index(args.next(), "answer", "question")?;
            // Everything after the question number is the value, spaces included.
            let value = rest
                .split_once(char::is_whitespace)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(CommandError::MissingArgument {
                    command: "answer",
                    argument: "value",
                })?;
            Ok(Command::Answer { question, value })
        }
        "clear" => Ok(Command::Clear {
            question: index(args.next(), "clear", "question")?,
        }),
        "flag" | "f" => Ok(Command::Flag {
            question: index(args.next(), "flag", "question")?,
        }),
        "strike" | "x" => {
            let question = index(args.next(), "strike", "question")?;
            let option = index(args.next(), "strike", "option")?;
            Ok(Command::Strike { question, option })
        }
        "goto" | "g" => Ok(Command::Goto {
            question: index(args.next(), "goto", "question")?,
        }),
        "next" | "n" => Ok(Command::Next),
        "prev" | "p" => Ok(Command::Prev),
        "show" | "s" => Ok(Command::Show),
        "overview" | "o" => Ok(Command::Overview),
        "submit" => Ok(Command::Submit),
        "skip" => Ok(Command::Skip),
        "save" | "quit" | "exit" => Ok(Command::Save),
        "finish" => Ok(Command::Finish),
        "help" | "?" => Ok(Command::Help),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

pub fn print_help() {
    println!("Commands (numbers start at 1):");
    println!("  answer <q> <value>   answer question q; a number picks that option");
    println!("  clear <q>            clear the answer of question q");
    println!("  flag <q>             toggle the review flag of question q");
    println!("  strike <q> <o>       toggle strike-out of option o on question q");
    println!("  goto <q> | next | prev | show");
    println!("  overview             answered / flagged grid of this module");
    println!("  submit               submit the current module");
    println!("  skip                 end the break early");
    println!("  save                 save and exit; the timer resumes on next start");
    println!("  finish               score the attempt once every module is submitted");
}
