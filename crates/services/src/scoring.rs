//! Scoring backends.
//!
//! `LocalScorer` grades in process; `RemoteScorer` hands the flat answer list
//! to an HTTP endpoint. Neither records the attempt: the session workflow
//! stores the `Submission` once a report comes back.

use std::sync::Arc;

use async_trait::async_trait;
use prep_core::model::{QuestionReview, ScoreReport, TestId, UserId};
use prep_core::scoring::grade;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use storage::repository::TestDefinitionRepository;

use crate::error::ScoringError;

/// Flat answers of a finished attempt, in section → module → question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub user_id: UserId,
    pub test_id: TestId,
    pub answers: Vec<String>,
    pub time_taken_seconds: u32,
}

#[async_trait]
pub trait Scorer: Send + Sync {
    /// Grade the attempt.
    ///
    /// # Errors
    ///
    /// Returns `ScoringError` if the test is unknown or the backend fails.
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreReport, ScoringError>;
}

//
// ─── LOCAL ─────────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct LocalScorer {
    tests: Arc<dyn TestDefinitionRepository>,
}

impl LocalScorer {
    #[must_use]
    pub fn new(tests: Arc<dyn TestDefinitionRepository>) -> Self {
        Self { tests }
    }
}

#[async_trait]
impl Scorer for LocalScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreReport, ScoringError> {
        let test = self
            .tests
            .get_test(request.test_id)
            .await?
            .ok_or(ScoringError::UnknownTest(request.test_id))?;

        Ok(grade(&test, &request.answers, request.time_taken_seconds))
    }
}

//
// ─── REMOTE ────────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct RemoteScorer {
    client: Client,
    url: String,
}

impl RemoteScorer {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Scorer for RemoteScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreReport, ScoringError> {
        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Err(ScoringError::AlreadySubmitted {
                user_id: request.user_id,
                test_id: request.test_id,
            });
        }
        if !status.is_success() {
            return Err(ScoringError::HttpStatus(status));
        }

        let body: RemoteScore = response.json().await?;
        Ok(ScoreReport {
            score: body.score,
            total_questions: body.total_questions,
            percentage: body.percentage,
            time_taken_secs: body.time_taken_seconds.unwrap_or(request.time_taken_seconds),
            reviews: body.reviews,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteScore {
    score: u32,
    total_questions: u32,
    percentage: f64,
    #[serde(default)]
    time_taken_seconds: Option<u32>,
    #[serde(default)]
    reviews: Vec<QuestionReview>,
}
