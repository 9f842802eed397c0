use std::fmt;
use std::sync::Arc;

use prep_core::model::{ScoreReport, SessionState, TestDefinition, TestId, UserId};

use super::progress::SessionProgress;

//
// ─── LIVE SESSION ──────────────────────────────────────────────────────────────
//

/// One open attempt: the immutable test, the mutable state and the store
/// version the next save must match.
///
/// Owned by a single driver; every workflow call takes it by `&mut`.
pub struct LiveSession {
    user_id: UserId,
    pub(crate) test: Arc<TestDefinition>,
    pub(crate) state: SessionState,
    pub(crate) version: u64,
    pub(crate) ticks_since_checkpoint: u32,
    // Flattened once per finalize attempt so retries send the same list.
    pub(crate) pending_answers: Option<Vec<String>>,
    pub(crate) report: Option<ScoreReport>,
}

impl LiveSession {
    pub(crate) fn new(
        user_id: UserId,
        test: Arc<TestDefinition>,
        state: SessionState,
        version: u64,
    ) -> Self {
        Self {
            user_id,
            test,
            state,
            version,
            ticks_since_checkpoint: 0,
            pending_answers: None,
            report: None,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn test_id(&self) -> TestId {
        self.test.id()
    }

    #[must_use]
    pub fn test(&self) -> &TestDefinition {
        &self.test
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Store version of the last accepted save.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Answer list cached by a failed finalize, reused by the retry.
    #[must_use]
    pub fn pending_answers(&self) -> Option<&[String]> {
        self.pending_answers.as_deref()
    }

    /// Score of a finalized attempt.
    #[must_use]
    pub fn report(&self) -> Option<&ScoreReport> {
        self.report.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::from_state(&self.test, &self.state)
    }
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession")
            .field("user_id", &self.user_id)
            .field("test_id", &self.test.id())
            .field("version", &self.version)
            .field("position", &self.state.position())
            .field("phase", &self.state.phase())
            .field("status", &self.state.status())
            .field("remaining_seconds", &self.state.remaining_seconds())
            .finish_non_exhaustive()
    }
}
