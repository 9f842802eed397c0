#![forbid(unsafe_code)]

pub mod error;
pub mod machine;
pub mod model;
pub mod scoring;
pub mod time;

pub use error::Error;
pub use machine::{ModuleOverview, QuestionStatus, TickOutcome, Transition};
pub use time::Clock;
