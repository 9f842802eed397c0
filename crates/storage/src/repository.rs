use async_trait::async_trait;
use prep_core::model::{Submission, TestDefinition, TestId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::record::ProgressRecord;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read access to authored tests, plus the writes the seed tooling needs.
#[async_trait]
pub trait TestDefinitionRepository: Send + Sync {
    /// Persist or replace a test definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the definition cannot be stored.
    async fn upsert_test(&self, test: &TestDefinition) -> Result<(), StorageError>;

    /// Fetch a test by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_test(&self, id: TestId) -> Result<Option<TestDefinition>, StorageError>;

    /// List tests ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_tests(&self, limit: u32) -> Result<Vec<TestDefinition>, StorageError>;
}

/// One resumable snapshot per (user, test), guarded by an optimistic version.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the snapshot for a user and test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_progress(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Insert or update a snapshot and return its new version.
    ///
    /// `expected_version` is `None` for the first save of an attempt and the
    /// last version read otherwise. `record.version` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a record exists when inserting, or
    /// the stored version differs from `expected_version` when updating.
    async fn save_progress(
        &self,
        record: &ProgressRecord,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError>;

    /// Remove a snapshot. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn delete_progress(&self, user_id: UserId, test_id: TestId)
    -> Result<bool, StorageError>;
}

/// Finalized attempts. At most one per (user, test).
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Record a finalized attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already submitted this test.
    async fn insert_submission(&self, submission: &Submission) -> Result<(), StorageError>;

    /// Fetch the submission of a user for a test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_submission(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<Option<Submission>, StorageError>;

    /// List a user's submissions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_submissions(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Submission>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tests: Arc<Mutex<HashMap<TestId, TestDefinition>>>,
    progress: Arc<Mutex<HashMap<(UserId, TestId), ProgressRecord>>>,
    submissions: Arc<Mutex<HashMap<(UserId, TestId), Submission>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl TestDefinitionRepository for InMemoryRepository {
    async fn upsert_test(&self, test: &TestDefinition) -> Result<(), StorageError> {
        let mut guard = self.tests.lock().map_err(poisoned)?;
        guard.insert(test.id(), test.clone());
        Ok(())
    }

    async fn get_test(&self, id: TestId) -> Result<Option<TestDefinition>, StorageError> {
        let guard = self.tests.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_tests(&self, limit: u32) -> Result<Vec<TestDefinition>, StorageError> {
        let guard = self.tests.lock().map_err(poisoned)?;
        let mut tests: Vec<TestDefinition> = guard.values().cloned().collect();
        tests.sort_by_key(TestDefinition::id);
        tests.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(tests)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, test_id)).cloned())
    }

    async fn save_progress(
        &self,
        record: &ProgressRecord,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let key = (record.user_id, record.test_id);
        let current = guard.get(&key).map(|r| r.version);
        let next = match (current, expected_version) {
            (None, None) => 1,
            (Some(stored), Some(expected)) if stored == expected => stored + 1,
            _ => return Err(StorageError::Conflict),
        };
        let mut stored = record.clone();
        stored.version = next;
        guard.insert(key, stored);
        Ok(next)
    }

    async fn delete_progress(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<bool, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.remove(&(user_id, test_id)).is_some())
    }
}

#[async_trait]
impl SubmissionRepository for InMemoryRepository {
    async fn insert_submission(&self, submission: &Submission) -> Result<(), StorageError> {
        let mut guard = self.submissions.lock().map_err(poisoned)?;
        let key = (submission.user_id, submission.test_id);
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key, submission.clone());
        Ok(())
    }

    async fn get_submission(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<Option<Submission>, StorageError> {
        let guard = self.submissions.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, test_id)).cloned())
    }

    async fn list_submissions(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Submission>, StorageError> {
        let guard = self.submissions.lock().map_err(poisoned)?;
        let mut out: Vec<Submission> = guard
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.test_id.cmp(&a.test_id))
        });
        out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(out)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub tests: Arc<dyn TestDefinitionRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let tests: Arc<dyn TestDefinitionRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let submissions: Arc<dyn SubmissionRepository> = Arc::new(repo);
        Self {
            tests,
            progress,
            submissions,
        }
    }
}
