use prep_core::model::{TestId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, from_json, id_i64, ser, test_id_from_i64, to_json, u32_from_i64, user_id_from_i64,
    usize_from_i64, usize_to_i64,
};
use crate::record::ProgressRecord;
use crate::repository::{ProgressRepository, StorageError};

fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressRecord, StorageError> {
    let version: i64 = row.try_get("version").map_err(ser)?;
    Ok(ProgressRecord {
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        test_id: test_id_from_i64(row.try_get("test_id").map_err(ser)?)?,
        version: u64::try_from(version)
            .map_err(|_| StorageError::Serialization(format!("invalid version: {version}")))?,
        section_index: usize_from_i64(
            "section_index",
            row.try_get("section_index").map_err(ser)?,
        )?,
        module_index: usize_from_i64("module_index", row.try_get("module_index").map_err(ser)?)?,
        question_index: usize_from_i64(
            "question_index",
            row.try_get("question_index").map_err(ser)?,
        )?,
        answers: from_json(&row.try_get::<String, _>("answers").map_err(ser)?)?,
        review_flags: from_json(&row.try_get::<String, _>("review_flags").map_err(ser)?)?,
        strike_outs: from_json(&row.try_get::<String, _>("strike_outs").map_err(ser)?)?,
        remaining_seconds: u32_from_i64(
            "remaining_seconds",
            row.try_get("remaining_seconds").map_err(ser)?,
        )?,
        elapsed_seconds: u32_from_i64(
            "elapsed_seconds",
            row.try_get("elapsed_seconds").map_err(ser)?,
        )?,
        status: row.try_get("status").map_err(ser)?,
        phase: row.try_get("phase").map_err(ser)?,
        last_updated: row.try_get("last_updated").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    user_id, test_id, version, section_index, module_index,
                    question_index, answers, review_flags, strike_outs,
                    remaining_seconds, elapsed_seconds, status, phase, last_updated
                FROM progress
                WHERE user_id = ?1 AND test_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("test_id", test_id.value())?)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn save_progress(
        &self,
        record: &ProgressRecord,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        let user_id = id_i64("user_id", record.user_id.value())?;
        let test_id = id_i64("test_id", record.test_id.value())?;
        let next = match expected_version {
            None => 1_u64,
            Some(v) => v.checked_add(1).ok_or(StorageError::Conflict)?,
        };
        let next_i64 = id_i64("version", next)?;

        let sql = if expected_version.is_none() {
            r"
                INSERT INTO progress (
                    version, section_index, module_index, question_index,
                    answers, review_flags, strike_outs, remaining_seconds,
                    elapsed_seconds, status, phase, last_updated, user_id, test_id
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ON CONFLICT(user_id, test_id) DO NOTHING
            "
        } else {
            r"
                UPDATE progress SET
                    version = ?1,
                    section_index = ?2,
                    module_index = ?3,
                    question_index = ?4,
                    answers = ?5,
                    review_flags = ?6,
                    strike_outs = ?7,
                    remaining_seconds = ?8,
                    elapsed_seconds = ?9,
                    status = ?10,
                    phase = ?11,
                    last_updated = ?12
                WHERE user_id = ?13 AND test_id = ?14 AND version = ?15
            "
        };

        let mut query = sqlx::query(sql)
            .bind(next_i64)
            .bind(usize_to_i64("section_index", record.section_index)?)
            .bind(usize_to_i64("module_index", record.module_index)?)
            .bind(usize_to_i64("question_index", record.question_index)?)
            .bind(to_json(&record.answers)?)
            .bind(to_json(&record.review_flags)?)
            .bind(to_json(&record.strike_outs)?)
            .bind(i64::from(record.remaining_seconds))
            .bind(i64::from(record.elapsed_seconds))
            .bind(record.status.as_str())
            .bind(record.phase.as_str())
            .bind(record.last_updated)
            .bind(user_id)
            .bind(test_id);
        if let Some(expected) = expected_version {
            query = query.bind(id_i64("version", expected)?);
        }

        let res = query.execute(self.pool()).await.map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(next)
    }

    async fn delete_progress(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM progress WHERE user_id = ?1 AND test_id = ?2")
            .bind(id_i64("user_id", user_id.value())?)
            .bind(id_i64("test_id", test_id.value())?)
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }
}
