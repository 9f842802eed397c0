use chrono::{DateTime, Utc};
use std::sync::Arc;

use prep_core::model::{Submission, TestId, UserId};
use storage::repository::SubmissionRepository;

use crate::error::SessionError;

/// Presentation-agnostic row of a user's submission history.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionListItem {
    pub test_id: TestId,
    pub submitted_at: DateTime<Utc>,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: f64,
    pub time_taken_secs: u32,
}

impl SubmissionListItem {
    #[must_use]
    pub fn from_submission(submission: &Submission) -> Self {
        Self {
            test_id: submission.test_id,
            submitted_at: submission.submitted_at,
            score: submission.report.score,
            total_questions: submission.report.total_questions,
            percentage: submission.report.percentage,
            time_taken_secs: submission.report.time_taken_secs,
        }
    }
}

/// Read side of finalized attempts: history and the results page.
#[derive(Clone)]
pub struct SubmissionService {
    submissions: Arc<dyn SubmissionRepository>,
}

impl SubmissionService {
    #[must_use]
    pub fn new(submissions: Arc<dyn SubmissionRepository>) -> Self {
        Self { submissions }
    }

    /// A user's submissions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Persistence` on repository failures.
    pub async fn history(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<SubmissionListItem>, SessionError> {
        let rows = self.submissions.list_submissions(user_id, limit).await?;
        Ok(rows.iter().map(SubmissionListItem::from_submission).collect())
    }

    /// Full result of one attempt, with per-question review.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Persistence` on repository failures.
    pub async fn result(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<Option<Submission>, SessionError> {
        Ok(self.submissions.get_submission(user_id, test_id).await?)
    }
}
