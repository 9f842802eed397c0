use std::sync::Arc;

use async_trait::async_trait;
use prep_core::model::{TestId, UserId};
use storage::repository::{StorageError, SubmissionRepository};

/// Outcome of an access check before a session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AccessDecision {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether a user may start or continue a test.
#[async_trait]
pub trait AccessGuard: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backing lookup fails.
    async fn check_access(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<AccessDecision, StorageError>;
}

/// Denies access once the user has a submission for the test.
#[derive(Clone)]
pub struct SubmissionAccessGuard {
    submissions: Arc<dyn SubmissionRepository>,
}

impl SubmissionAccessGuard {
    #[must_use]
    pub fn new(submissions: Arc<dyn SubmissionRepository>) -> Self {
        Self { submissions }
    }
}

#[async_trait]
impl AccessGuard for SubmissionAccessGuard {
    async fn check_access(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<AccessDecision, StorageError> {
        match self.submissions.get_submission(user_id, test_id).await? {
            Some(_) => Ok(AccessDecision::deny("test already submitted")),
            None => Ok(AccessDecision::allow()),
        }
    }
}
