use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use prep_core::model::{
    ScoreReport, SessionPhase, SessionState, SessionStateError, SessionStatus, Submission, TestId,
    UserId,
};
use prep_core::{Clock, ModuleOverview, TickOutcome, Transition};
use storage::record::ProgressRecord;
use storage::repository::{ProgressRepository, SubmissionRepository, TestDefinitionRepository};

use super::service::LiveSession;
use crate::access::AccessGuard;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::scoring::{ScoreRequest, Scorer};

/// Opens sessions and runs every transition that touches a store or the scorer.
///
/// Local edits (answers, markers, navigation) never do I/O. Module and
/// section changes, break boundaries and periodic tick checkpoints persist a
/// snapshot guarded by the store version held in the `LiveSession`.
#[derive(Clone)]
pub struct SessionWorkflowService {
    clock: Clock,
    config: SessionConfig,
    tests: Arc<dyn TestDefinitionRepository>,
    progress: Arc<dyn ProgressRepository>,
    submissions: Arc<dyn SubmissionRepository>,
    guard: Arc<dyn AccessGuard>,
    scorer: Arc<dyn Scorer>,
}

impl SessionWorkflowService {
    #[must_use]
    pub fn new(
        clock: Clock,
        config: SessionConfig,
        tests: Arc<dyn TestDefinitionRepository>,
        progress: Arc<dyn ProgressRepository>,
        submissions: Arc<dyn SubmissionRepository>,
        guard: Arc<dyn AccessGuard>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            clock,
            config,
            tests,
            progress,
            submissions,
            guard,
            scorer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    //
    // ─── OPEN ──────────────────────────────────────────────────────────────────
    //

    /// Start a fresh attempt or resume the saved one.
    ///
    /// A resumed module whose countdown ran out while the user was away is
    /// submitted immediately; an elapsed break moves on to the next section.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyCompleted` when the guard denies access or
    /// the snapshot is completed, `SessionError::NotFound` for an unknown test,
    /// and store, timeout or state errors otherwise.
    pub async fn open(&self, user_id: UserId, test_id: TestId) -> Result<LiveSession, SessionError> {
        let store_timeout = self.config.store_timeout();

        let decision = bounded(
            "access check",
            store_timeout,
            self.guard.check_access(user_id, test_id),
        )
        .await?;
        if !decision.allowed {
            tracing::info!(%user_id, %test_id, reason = ?decision.reason, "access denied");
            return Err(SessionError::AlreadyCompleted { user_id, test_id });
        }

        let test = bounded("load test", store_timeout, self.tests.get_test(test_id))
            .await?
            .ok_or(SessionError::NotFound(test_id))?;
        let test = Arc::new(test);

        let saved = bounded(
            "load progress",
            store_timeout,
            self.progress.get_progress(user_id, test_id),
        )
        .await?;

        let now = self.clock.now();
        let Some(record) = saved else {
            let state = SessionState::start(&test, now)?;
            let record = ProgressRecord::from_state(user_id, test_id, &state);
            let version = bounded(
                "save progress",
                store_timeout,
                self.progress.save_progress(&record, None),
            )
            .await?;
            tracing::info!(%user_id, %test_id, "started session");
            return Ok(LiveSession::new(user_id, test, state, version));
        };

        let version = record.version;
        let saved = record.into_state()?;
        if saved.status() == SessionStatus::Completed {
            return Err(SessionError::AlreadyCompleted { user_id, test_id });
        }

        let mut state = SessionState::resume(&saved, now);
        state.reconcile(&test)?;
        if state.needs_expiry() {
            let transition = match state.phase() {
                SessionPhase::Break => state.skip_break(&test)?,
                _ => state.on_timer_expired(&test)?,
            };
            tracing::info!(%user_id, %test_id, ?transition, "countdown ran out while away");
        }

        let mut live = LiveSession::new(user_id, test, state, version);
        self.persist(&mut live).await?;
        tracing::info!(
            %user_id,
            %test_id,
            position = %live.state.position(),
            remaining = live.state.remaining_seconds(),
            "resumed session"
        );
        Ok(live)
    }

    //
    // ─── LOCAL EDITS ───────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `SessionError::State` when the session rejects the answer.
    pub fn answer(
        &self,
        live: &mut LiveSession,
        question: usize,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        live.state
            .answer(&live.test, question, value, self.config.answer_policy)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::State` when the session rejects the edit.
    pub fn clear_answer(&self, live: &mut LiveSession, question: usize) -> Result<(), SessionError> {
        live.state.clear_answer(&live.test, question)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::State` when the session rejects the edit.
    pub fn toggle_review(
        &self,
        live: &mut LiveSession,
        question: usize,
    ) -> Result<bool, SessionError> {
        Ok(live.state.toggle_review(&live.test, question)?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::State` when the session rejects the edit.
    pub fn toggle_strike(
        &self,
        live: &mut LiveSession,
        question: usize,
        option: usize,
    ) -> Result<bool, SessionError> {
        Ok(live.state.toggle_strike(&live.test, question, option)?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::State` for an invalid index.
    pub fn go_to_question(
        &self,
        live: &mut LiveSession,
        question: usize,
    ) -> Result<(), SessionError> {
        live.state.go_to_question(&live.test, question)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::State` outside a module.
    pub fn next_question(&self, live: &mut LiveSession) -> Result<usize, SessionError> {
        Ok(live.state.next_question(&live.test)?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::State` outside a module.
    pub fn previous_question(&self, live: &mut LiveSession) -> Result<usize, SessionError> {
        Ok(live.state.previous_question()?)
    }

    #[must_use]
    pub fn overview(&self, live: &LiveSession) -> ModuleOverview {
        live.state.module_overview(&live.test)
    }

    //
    // ─── TIMERS / PROGRESSION ──────────────────────────────────────────────────
    //

    /// Apply one second to whichever countdown is active.
    ///
    /// An expired module is submitted in the same call. Any transition is
    /// persisted, and so is every `checkpoint_every_secs`-th plain tick.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` when no countdown is active, or a store
    /// error if the resulting save fails; the tick itself is kept.
    pub async fn tick(&self, live: &mut LiveSession) -> Result<TickOutcome, SessionError> {
        let test = Arc::clone(&live.test);
        let outcome = match live.state.phase() {
            SessionPhase::Break => live.state.break_tick(&test)?,
            SessionPhase::Module | SessionPhase::AwaitingScore => match live.state.tick()? {
                TickOutcome::Expired => {
                    let transition = live.state.on_timer_expired(&test)?;
                    tracing::info!(
                        user_id = %live.user_id(),
                        test_id = %live.test_id(),
                        ?transition,
                        "module time expired"
                    );
                    TickOutcome::Advanced(transition)
                }
                other => other,
            },
        };

        match outcome {
            TickOutcome::Advanced(_) => self.persist(live).await?,
            TickOutcome::Running { .. } | TickOutcome::Expired => {
                live.ticks_since_checkpoint = live.ticks_since_checkpoint.saturating_add(1);
                if live.ticks_since_checkpoint >= self.config.checkpoint_every_secs {
                    self.persist(live).await?;
                    tracing::debug!(
                        user_id = %live.user_id(),
                        test_id = %live.test_id(),
                        version = live.version,
                        "tick checkpoint"
                    );
                }
            }
        }
        Ok(outcome)
    }

    /// Submit the current module and persist the new position.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` outside a module. On a store error the
    /// transition has already happened; `checkpoint` retries the save.
    pub async fn submit_module(&self, live: &mut LiveSession) -> Result<Transition, SessionError> {
        let test = Arc::clone(&live.test);
        let transition = live.state.submit_module(&test)?;
        self.persist(live).await?;
        Ok(transition)
    }

    /// End the current break early.
    ///
    /// # Errors
    ///
    /// Same as [`SessionWorkflowService::submit_module`], outside a break.
    pub async fn skip_break(&self, live: &mut LiveSession) -> Result<Transition, SessionError> {
        let test = Arc::clone(&live.test);
        let transition = live.state.skip_break(&test)?;
        self.persist(live).await?;
        Ok(transition)
    }

    /// Persist the current state now.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Conflict` if another writer saved in between, or
    /// a persistence/timeout error.
    pub async fn checkpoint(&self, live: &mut LiveSession) -> Result<(), SessionError> {
        self.persist(live).await
    }

    /// Pause and persist, keeping the countdown for the next open.
    ///
    /// The in-memory state only becomes paused once the save succeeded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` for a completed session, or the store error.
    pub async fn save_and_exit(&self, live: &mut LiveSession) -> Result<(), SessionError> {
        let mut paused = live.state.clone();
        paused.pause()?;
        paused.touch(self.clock.now());

        let record = ProgressRecord::from_state(live.user_id(), live.test_id(), &paused);
        let version = bounded(
            "save progress",
            self.config.store_timeout(),
            self.progress.save_progress(&record, Some(live.version)),
        )
        .await?;

        live.state = paused;
        live.version = version;
        live.ticks_since_checkpoint = 0;
        tracing::info!(
            user_id = %live.user_id(),
            test_id = %live.test_id(),
            remaining = live.state.remaining_seconds(),
            "saved and exited"
        );
        Ok(())
    }

    //
    // ─── FINALIZE ──────────────────────────────────────────────────────────────
    //

    /// Score the attempt, record the submission and mark the session completed.
    ///
    /// The flat answer list is computed once and cached on the session, so a
    /// retry after a scoring or recording failure sends exactly the same
    /// answers. Calling this again on a finalized session returns the stored
    /// report.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` unless every module is submitted,
    /// `SessionError::AlreadyCompleted` if a different attempt was recorded
    /// first, or a scoring/store/timeout error; the session stays unfinalized
    /// in every error case.
    pub async fn finalize(&self, live: &mut LiveSession) -> Result<ScoreReport, SessionError> {
        if let Some(report) = &live.report {
            return Ok(report.clone());
        }
        match live.state.status() {
            SessionStatus::Completed => return Err(SessionStateError::Completed.into()),
            SessionStatus::Paused => return Err(SessionStateError::Paused.into()),
            SessionStatus::InProgress => {}
        }
        if live.state.phase() != SessionPhase::AwaitingScore {
            return Err(SessionStateError::WrongPhase {
                expected: SessionPhase::AwaitingScore,
                actual: live.state.phase(),
            }
            .into());
        }

        let answers = match &live.pending_answers {
            Some(cached) => cached.clone(),
            None => {
                let flat = live.state.flatten_answers(&live.test);
                live.pending_answers = Some(flat.clone());
                flat
            }
        };
        let request = ScoreRequest {
            user_id: live.user_id(),
            test_id: live.test_id(),
            answers,
            time_taken_seconds: live.state.elapsed_seconds(),
        };

        let scored = bounded(
            "scoring",
            self.config.scoring_timeout(),
            self.scorer.score(&request),
        )
        .await?;
        let report = self.record_submission(request, scored).await?;

        live.state.mark_completed()?;
        live.report = Some(report.clone());
        live.pending_answers = None;

        // The submission exists now and the guard refuses re-entry on it; a
        // failed terminal save only costs the snapshot.
        if let Err(err) = self.persist(live).await {
            tracing::warn!(
                user_id = %live.user_id(),
                test_id = %live.test_id(),
                error = %err,
                "failed to persist completed session"
            );
        }
        tracing::info!(
            user_id = %live.user_id(),
            test_id = %live.test_id(),
            score = report.score,
            total = report.total_questions,
            "finalized session"
        );
        Ok(report)
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    /// Store the scored attempt so the access guard sees it.
    ///
    /// A submission already holding the same answers is a retry whose earlier
    /// response was lost; its stored report wins.
    async fn record_submission(
        &self,
        request: ScoreRequest,
        report: ScoreReport,
    ) -> Result<ScoreReport, SessionError> {
        let store_timeout = self.config.store_timeout();
        let (user_id, test_id) = (request.user_id, request.test_id);
        let submission = Submission {
            user_id,
            test_id,
            answers: request.answers,
            report,
            submitted_at: self.clock.now(),
        };

        match bounded(
            "record submission",
            store_timeout,
            self.submissions.insert_submission(&submission),
        )
        .await
        {
            Ok(()) => Ok(submission.report),
            Err(SessionError::Conflict) => {
                let existing = bounded(
                    "load submission",
                    store_timeout,
                    self.submissions.get_submission(user_id, test_id),
                )
                .await?;
                match existing {
                    Some(existing) if existing.answers == submission.answers => {
                        tracing::info!(%user_id, %test_id, "submission already recorded");
                        Ok(existing.report)
                    }
                    _ => Err(SessionError::AlreadyCompleted { user_id, test_id }),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn persist(&self, live: &mut LiveSession) -> Result<(), SessionError> {
        let now = self.clock.now();
        let mut snapshot = live.state.clone();
        snapshot.touch(now);

        let record = ProgressRecord::from_state(live.user_id(), live.test_id(), &snapshot);
        let version = bounded(
            "save progress",
            self.config.store_timeout(),
            self.progress.save_progress(&record, Some(live.version)),
        )
        .await?;

        live.state.touch(now);
        live.version = version;
        live.ticks_since_checkpoint = 0;
        Ok(())
    }
}

/// Run a store or scorer call under `limit`.
async fn bounded<T, E>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, SessionError>
where
    SessionError: From<E>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(SessionError::from),
        Err(_) => {
            tracing::warn!(operation, ?limit, "call timed out");
            Err(SessionError::Timeout { operation })
        }
    }
}
