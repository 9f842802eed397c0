use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned migrations for the current schema.
///
/// Version 1 creates tests, progress snapshots and submissions.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS tests (
                    id INTEGER PRIMARY KEY,
                    title TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    definition TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progress (
                    user_id INTEGER NOT NULL,
                    test_id INTEGER NOT NULL,
                    version INTEGER NOT NULL CHECK (version >= 1),
                    section_index INTEGER NOT NULL CHECK (section_index >= 0),
                    module_index INTEGER NOT NULL CHECK (module_index >= 0),
                    question_index INTEGER NOT NULL CHECK (question_index >= 0),
                    answers TEXT NOT NULL,
                    review_flags TEXT NOT NULL,
                    strike_outs TEXT NOT NULL,
                    remaining_seconds INTEGER NOT NULL CHECK (remaining_seconds >= 0),
                    elapsed_seconds INTEGER NOT NULL CHECK (elapsed_seconds >= 0),
                    status TEXT NOT NULL,
                    phase TEXT NOT NULL,
                    last_updated TEXT NOT NULL,
                    PRIMARY KEY (user_id, test_id),
                    FOREIGN KEY (test_id) REFERENCES tests(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS submissions (
                    user_id INTEGER NOT NULL,
                    test_id INTEGER NOT NULL,
                    answers TEXT NOT NULL,
                    report TEXT NOT NULL,
                    score INTEGER NOT NULL CHECK (score >= 0),
                    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                    percentage REAL NOT NULL,
                    submitted_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, test_id),
                    FOREIGN KEY (test_id) REFERENCES tests(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_submissions_user_submitted
                    ON submissions (user_id, submitted_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(version = 1, "applied sqlite migration");
    }

    Ok(())
}
