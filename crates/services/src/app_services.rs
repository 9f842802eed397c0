use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::access::{AccessGuard, SubmissionAccessGuard};
use crate::config::SessionConfig;
use crate::error::AppServicesError;
use crate::scoring::{LocalScorer, RemoteScorer, Scorer};
use crate::sessions::{SessionWorkflowService, SubmissionService};

/// Assembles app-facing services over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    workflow: Arc<SessionWorkflowService>,
    submissions: Arc<SubmissionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: SessionConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, config))
    }

    /// Wire services over an existing storage aggregate.
    ///
    /// A configured `scoring_url` selects the remote scorer; otherwise attempts
    /// are graded locally. Either way the workflow records finished attempts
    /// in `storage.submissions`, which the access guard reads.
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, config: SessionConfig) -> Self {
        let scorer: Arc<dyn Scorer> = match &config.scoring_url {
            Some(url) => {
                tracing::info!(url = %url, "using remote scorer");
                Arc::new(RemoteScorer::new(url.clone()))
            }
            None => Arc::new(LocalScorer::new(Arc::clone(&storage.tests))),
        };
        let guard: Arc<dyn AccessGuard> = Arc::new(SubmissionAccessGuard::new(Arc::clone(
            &storage.submissions,
        )));

        let workflow = Arc::new(SessionWorkflowService::new(
            clock,
            config,
            Arc::clone(&storage.tests),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.submissions),
            guard,
            scorer,
        ));
        let submissions = Arc::new(SubmissionService::new(Arc::clone(&storage.submissions)));

        Self {
            storage,
            workflow,
            submissions,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn workflow(&self) -> Arc<SessionWorkflowService> {
        Arc::clone(&self.workflow)
    }

    #[must_use]
    pub fn submissions(&self) -> Arc<SubmissionService> {
        Arc::clone(&self.submissions)
    }
}
