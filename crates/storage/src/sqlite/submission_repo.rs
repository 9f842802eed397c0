use prep_core::model::{ScoreReport, Submission, TestId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, from_json, id_i64, ser, test_id_from_i64, to_json, user_id_from_i64,
};
use crate::repository::{StorageError, SubmissionRepository};

fn map_submission_row(row: &sqlx::sqlite::SqliteRow) -> Result<Submission, StorageError> {
    let answers: Vec<String> = from_json(&row.try_get::<String, _>("answers").map_err(ser)?)?;
    let report: ScoreReport = from_json(&row.try_get::<String, _>("report").map_err(ser)?)?;
    Ok(Submission {
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        test_id: test_id_from_i64(row.try_get("test_id").map_err(ser)?)?,
        answers,
        report,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl SubmissionRepository for SqliteRepository {
    async fn insert_submission(&self, submission: &Submission) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO submissions (
                    user_id, test_id, answers, report, score,
                    total_questions, percentage, submitted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(user_id, test_id) DO NOTHING
            ",
        )
        .bind(id_i64("user_id", submission.user_id.value())?)
        .bind(id_i64("test_id", submission.test_id.value())?)
        .bind(to_json(&submission.answers)?)
        .bind(to_json(&submission.report)?)
        .bind(i64::from(submission.report.score))
        .bind(i64::from(submission.report.total_questions))
        .bind(submission.report.percentage)
        .bind(submission.submitted_at)
        .execute(self.pool())
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn get_submission(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<Option<Submission>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, test_id, answers, report, submitted_at
                FROM submissions
                WHERE user_id = ?1 AND test_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("test_id", test_id.value())?)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        row.as_ref().map(map_submission_row).transpose()
    }

    async fn list_submissions(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Submission>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, test_id, answers, report, submitted_at
                FROM submissions
                WHERE user_id = ?1
                ORDER BY submitted_at DESC, test_id DESC
                LIMIT ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        rows.iter().map(map_submission_row).collect()
    }
}
