use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{TestId, UserId};
use crate::model::session::QuestionKey;

/// Per-question outcome shown on the results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionReview {
    pub key: QuestionKey,
    pub prompt: String,
    pub selected: String,
    pub correct_answer: String,
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Result of grading one flat answer list against a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: u32,
    pub total_questions: u32,
    pub percentage: f64,
    pub time_taken_secs: u32,
    pub reviews: Vec<QuestionReview>,
}

/// The finalized, scored record of one completed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub user_id: UserId,
    pub test_id: TestId,
    pub answers: Vec<String>,
    pub report: ScoreReport,
    pub submitted_at: DateTime<Utc>,
}
