use chrono::Utc;
use prep_core::model::{TestDefinition, TestDefinitionDraft, TestId, TestKind};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, from_json, id_i64, ser, to_json};
use crate::repository::{StorageError, TestDefinitionRepository};

fn kind_str(kind: TestKind) -> &'static str {
    match kind {
        TestKind::Sat => "sat",
        TestKind::Gre => "gre",
    }
}

fn map_test_row(row: &sqlx::sqlite::SqliteRow) -> Result<TestDefinition, StorageError> {
    let raw: String = row.try_get("definition").map_err(ser)?;
    let draft: TestDefinitionDraft = from_json(&raw)?;
    draft.validate().map_err(ser)
}

#[async_trait::async_trait]
impl TestDefinitionRepository for SqliteRepository {
    async fn upsert_test(&self, test: &TestDefinition) -> Result<(), StorageError> {
        let id = id_i64("test_id", test.id().value())?;
        let definition = to_json(&test.to_draft())?;

        sqlx::query(
            r"
                INSERT INTO tests (id, title, kind, definition, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    kind = excluded.kind,
                    definition = excluded.definition,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(id)
        .bind(test.title())
        .bind(kind_str(test.kind()))
        .bind(definition)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_test(&self, id: TestId) -> Result<Option<TestDefinition>, StorageError> {
        let row = sqlx::query("SELECT definition FROM tests WHERE id = ?1")
            .bind(id_i64("test_id", id.value())?)
            .fetch_optional(self.pool())
            .await
            .map_err(conn)?;

        row.as_ref().map(map_test_row).transpose()
    }

    async fn list_tests(&self, limit: u32) -> Result<Vec<TestDefinition>, StorageError> {
        let rows = sqlx::query("SELECT definition FROM tests ORDER BY id ASC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(conn)?;

        rows.iter().map(map_test_row).collect()
    }
}
