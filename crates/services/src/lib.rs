#![forbid(unsafe_code)]

pub mod access;
pub mod app_services;
pub mod config;
pub mod error;
pub mod scoring;
pub mod sessions;

pub use prep_core::Clock;
pub use sessions as session;

pub use access::{AccessDecision, AccessGuard, SubmissionAccessGuard};
pub use app_services::AppServices;
pub use config::SessionConfig;
pub use error::{AppServicesError, ConfigError, ScoringError, SessionError};
pub use scoring::{LocalScorer, RemoteScorer, ScoreRequest, Scorer};

pub use sessions::{
    LiveSession, SessionProgress, SessionTicker, SessionWorkflowService, SubmissionListItem,
    SubmissionService, TickSignal,
};
