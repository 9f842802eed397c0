//! Shared error types for the services crate.

use thiserror::Error;

use prep_core::model::{SessionStateError, TestId, UserId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by scorers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScoringError {
    #[error("test {0} not found")]
    UnknownTest(TestId),
    #[error("user {user_id} already submitted test {test_id}")]
    AlreadySubmitted { user_id: UserId, test_id: TestId },
    #[error("scoring request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ScoringError {
    /// Network failures, 5xx responses and store errors may clear up on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Storage(_) => true,
            Self::HttpStatus(status) => status.is_server_error(),
            Self::UnknownTest(_) | Self::AlreadySubmitted { .. } => false,
        }
    }
}

/// Errors emitted while loading `SessionConfig`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("user {user_id} already completed test {test_id}")]
    AlreadyCompleted { user_id: UserId, test_id: TestId },
    #[error("test {0} not found")]
    NotFound(TestId),
    #[error("progress was saved elsewhere; reopen the session")]
    Conflict,
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
    #[error(transparent)]
    Persistence(StorageError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    State(#[from] SessionStateError),
}

impl SessionError {
    /// Whether repeating the same call can succeed without reopening the session.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(_) | Self::Timeout { .. } => true,
            Self::Scoring(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::Conflict,
            other => Self::Persistence(other),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
