use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use prep_core::model::{
    AnswerPolicy, ModuleDraft, ModuleKey, QuestionDraft, ScoreReport, SectionDraft, SessionPhase,
    SessionStateError, SessionStatus, Submission, TestDefinition, TestDefinitionDraft, TestId,
    UserId,
};
use prep_core::time::fixed_now;
use prep_core::{TickOutcome, Transition};
use services::{
    AppServices, Clock, LocalScorer, ScoreRequest, Scorer, ScoringError, SessionConfig,
    SessionError, SessionWorkflowService, SubmissionAccessGuard,
};
use storage::record::ProgressRecord;
use storage::repository::{ProgressRepository, Storage, StorageError, SubmissionRepository};

const USER: UserId = UserId::new(7);

fn module(name: &str, timer_seconds: u32, correct: &[&str]) -> ModuleDraft {
    ModuleDraft {
        name: name.into(),
        timer_seconds,
        questions: correct
            .iter()
            .enumerate()
            .map(|(i, c)| QuestionDraft::new(format!("Q{i}"), &["A", "B", "C", "D"], *c))
            .collect(),
    }
}

/// One section, modules of three and two questions, no break.
fn single_section(id: u64, timer_seconds: u32) -> TestDefinition {
    TestDefinitionDraft {
        id: TestId::new(id),
        title: "Single section".into(),
        kind: Default::default(),
        sections: vec![SectionDraft {
            name: "Reading".into(),
            break_seconds: 0,
            modules: vec![
                module("M1", timer_seconds, &["A", "B", "C"]),
                module("M2", timer_seconds, &["D", "A"]),
            ],
        }],
    }
    .validate()
    .unwrap()
}

/// Two single-module sections with a break between them.
fn with_break(id: u64) -> TestDefinition {
    TestDefinitionDraft {
        id: TestId::new(id),
        title: "With break".into(),
        kind: Default::default(),
        sections: vec![
            SectionDraft {
                name: "Verbal".into(),
                break_seconds: 3,
                modules: vec![module("V1", 5, &["A"])],
            },
            SectionDraft {
                name: "Quant".into(),
                break_seconds: 0,
                modules: vec![module("Q1", 5, &["B"])],
            },
        ],
    }
    .validate()
    .unwrap()
}

async fn storage_with(tests: &[TestDefinition]) -> Storage {
    let storage = Storage::in_memory();
    for test in tests {
        storage.tests.upsert_test(test).await.unwrap();
    }
    storage
}

fn workflow_at(storage: &Storage, at: chrono::DateTime<chrono::Utc>) -> Arc<SessionWorkflowService> {
    AppServices::from_storage(storage.clone(), Clock::fixed(at), SessionConfig::default())
        .workflow()
}

#[tokio::test]
async fn full_attempt_flattens_in_order_and_blocks_reentry() {
    let test = single_section(1, 10);
    let storage = storage_with(&[test.clone()]).await;
    let services = AppServices::from_storage(
        storage.clone(),
        Clock::fixed(fixed_now()),
        SessionConfig::default(),
    );
    let workflow = services.workflow();

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    assert_eq!(live.state().position(), ModuleKey::new(0, 0));
    assert_eq!(live.state().current_answers(), ["", "", ""]);
    assert_eq!(live.version(), 1);

    workflow.answer(&mut live, 0, "A").unwrap();
    workflow.answer(&mut live, 2, "C").unwrap();
    assert_eq!(workflow.overview(&live).answered, 2);

    let t = workflow.submit_module(&mut live).await.unwrap();
    assert_eq!(t, Transition::NextModule(ModuleKey::new(0, 1)));
    assert_eq!(live.state().remaining_seconds(), 10);
    assert_eq!(live.state().current_answers(), ["", ""]);

    let t = workflow.submit_module(&mut live).await.unwrap();
    assert_eq!(t, Transition::ReadyToFinalize);

    let report = workflow.finalize(&mut live).await.unwrap();
    assert_eq!(report.score, 2);
    assert_eq!(report.total_questions, 5);
    assert!((report.percentage - 40.0).abs() < f64::EPSILON);
    assert_eq!(live.state().status(), SessionStatus::Completed);

    let submission = services
        .submissions()
        .result(USER, test.id())
        .await
        .unwrap()
        .expect("submission recorded");
    assert_eq!(submission.answers, ["A", "", "C", "", ""]);

    let history = services.submissions().history(USER, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].score, 2);

    let stored = storage
        .progress
        .get_progress(USER, test.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "completed");

    // Finalizing twice hands back the same report.
    assert_eq!(workflow.finalize(&mut live).await.unwrap(), report);

    let err = workflow.open(USER, test.id()).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyCompleted { .. }));
}

#[tokio::test]
async fn reopening_deducts_time_spent_away() {
    let test = single_section(1, 100);
    let storage = storage_with(&[test.clone()]).await;
    let t0 = fixed_now();

    let live = workflow_at(&storage, t0).open(USER, test.id()).await.unwrap();
    assert_eq!(live.state().remaining_seconds(), 100);

    let live = workflow_at(&storage, t0 + ChronoDuration::seconds(30))
        .open(USER, test.id())
        .await
        .unwrap();
    assert_eq!(live.state().remaining_seconds(), 70);
    assert_eq!(live.state().elapsed_seconds(), 30);

    // 120 more seconds away exhausts the module; it is submitted on open.
    let live = workflow_at(&storage, t0 + ChronoDuration::seconds(150))
        .open(USER, test.id())
        .await
        .unwrap();
    assert_eq!(live.state().position(), ModuleKey::new(0, 1));
    assert_eq!(live.state().remaining_seconds(), 100);
    assert_eq!(live.state().elapsed_seconds(), 100);
}

#[tokio::test]
async fn save_and_exit_freezes_the_countdown() {
    let test = single_section(1, 100);
    let storage = storage_with(&[test.clone()]).await;
    let t0 = fixed_now();
    let workflow = workflow_at(&storage, t0);

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.answer(&mut live, 1, "B").unwrap();
    workflow.save_and_exit(&mut live).await.unwrap();
    assert_eq!(live.state().status(), SessionStatus::Paused);

    let err = workflow.answer(&mut live, 0, "A").unwrap_err();
    assert!(matches!(err, SessionError::State(SessionStateError::Paused)));

    let live = workflow_at(&storage, t0 + ChronoDuration::hours(2))
        .open(USER, test.id())
        .await
        .unwrap();
    assert_eq!(live.state().status(), SessionStatus::InProgress);
    assert_eq!(live.state().remaining_seconds(), 100);
    assert_eq!(live.state().current_answers(), ["", "B", ""]);
}

#[tokio::test]
async fn stale_session_gets_a_conflict() {
    let test = single_section(1, 100);
    let storage = storage_with(&[test.clone()]).await;
    let workflow = workflow_at(&storage, fixed_now());

    let mut first_tab = workflow.open(USER, test.id()).await.unwrap();
    let mut second_tab = workflow.open(USER, test.id()).await.unwrap();
    assert_eq!(second_tab.version(), 2);

    let err = workflow.checkpoint(&mut first_tab).await.unwrap_err();
    assert!(matches!(err, SessionError::Conflict));
    assert!(!err.is_retryable());

    workflow.checkpoint(&mut second_tab).await.unwrap();
    assert_eq!(second_tab.version(), 3);
}

#[tokio::test]
async fn ticks_checkpoint_and_expire_modules() {
    let test = single_section(1, 4);
    let storage = storage_with(&[test.clone()]).await;
    let config = SessionConfig {
        checkpoint_every_secs: 2,
        ..SessionConfig::default()
    };
    let workflow =
        AppServices::from_storage(storage.clone(), Clock::fixed(fixed_now()), config).workflow();

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.answer(&mut live, 0, "A").unwrap();

    assert_eq!(
        workflow.tick(&mut live).await.unwrap(),
        TickOutcome::Running { remaining: 3 }
    );
    assert_eq!(live.version(), 1);
    assert_eq!(
        workflow.tick(&mut live).await.unwrap(),
        TickOutcome::Running { remaining: 2 }
    );
    assert_eq!(live.version(), 2);

    workflow.tick(&mut live).await.unwrap();
    let expired = workflow.tick(&mut live).await.unwrap();
    assert_eq!(
        expired,
        TickOutcome::Advanced(Transition::NextModule(ModuleKey::new(0, 1)))
    );
    assert_eq!(live.state().remaining_seconds(), 4);

    let stored = storage
        .progress
        .get_progress(USER, test.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.module_index, 1);
    assert_eq!(stored.version, live.version());
    assert_eq!(stored.answers[0].answers, ["A", "", ""]);
}

#[tokio::test]
async fn break_counts_down_then_enters_next_section() {
    let test = with_break(2);
    let storage = storage_with(&[test.clone()]).await;
    let workflow = workflow_at(&storage, fixed_now());

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    let t = workflow.submit_module(&mut live).await.unwrap();
    assert_eq!(t, Transition::BreakStarted { seconds: 3 });
    assert!(live.state().is_on_break());
    assert_eq!(live.state().status(), SessionStatus::InProgress);

    assert_eq!(
        workflow.tick(&mut live).await.unwrap(),
        TickOutcome::Running { remaining: 2 }
    );
    workflow.tick(&mut live).await.unwrap();
    assert_eq!(
        workflow.tick(&mut live).await.unwrap(),
        TickOutcome::Advanced(Transition::NextSection(ModuleKey::new(1, 0)))
    );
    assert_eq!(live.state().remaining_seconds(), 5);

    for _ in 0..4 {
        assert!(matches!(
            workflow.tick(&mut live).await.unwrap(),
            TickOutcome::Running { .. }
        ));
    }
    assert_eq!(
        workflow.tick(&mut live).await.unwrap(),
        TickOutcome::Advanced(Transition::ReadyToFinalize)
    );
    assert_eq!(live.state().phase(), SessionPhase::AwaitingScore);

    let report = workflow.finalize(&mut live).await.unwrap();
    assert_eq!(report.total_questions, 2);
    // Break seconds are not module time.
    assert_eq!(report.time_taken_secs, 5);
}

#[tokio::test]
async fn skipping_a_break_moves_on_immediately() {
    let test = with_break(2);
    let storage = storage_with(&[test.clone()]).await;
    let workflow = workflow_at(&storage, fixed_now());

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.submit_module(&mut live).await.unwrap();
    let t = workflow.skip_break(&mut live).await.unwrap();
    assert_eq!(t, Transition::NextSection(ModuleKey::new(1, 0)));

    let err = workflow.skip_break(&mut live).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::State(SessionStateError::WrongPhase { .. })
    ));
}

#[tokio::test]
async fn reopening_during_a_break_keeps_or_finishes_it() {
    let test = with_break(2);
    let storage = storage_with(&[test.clone()]).await;
    let mut clock = Clock::fixed(fixed_now());

    let services = AppServices::from_storage(storage.clone(), clock, SessionConfig::default());
    let workflow = services.workflow();
    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.submit_module(&mut live).await.unwrap();
    assert!(live.state().is_on_break());

    clock.advance(ChronoDuration::seconds(1));
    let services = AppServices::from_storage(storage.clone(), clock, SessionConfig::default());
    let live = services.workflow().open(USER, test.id()).await.unwrap();
    assert_eq!(live.state().phase(), SessionPhase::Break);
    assert_eq!(live.state().remaining_seconds(), 2);

    // Away far longer than the break: the next section starts with a full timer.
    clock.advance(ChronoDuration::seconds(59));
    let services = AppServices::from_storage(storage.clone(), clock, SessionConfig::default());
    let live = services.workflow().open(USER, test.id()).await.unwrap();
    assert_eq!(live.state().phase(), SessionPhase::Module);
    assert_eq!(live.state().position(), ModuleKey::new(1, 0));
    assert_eq!(live.state().remaining_seconds(), 5);
    assert_eq!(live.state().elapsed_seconds(), 0);

    let stored = storage
        .progress
        .get_progress(USER, test.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.section_index, 1);
    assert_eq!(stored.phase, "module");
}

#[tokio::test]
async fn unknown_test_is_not_found() {
    let storage = storage_with(&[]).await;
    let err = workflow_at(&storage, fixed_now())
        .open(USER, TestId::new(99))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(id) if id == TestId::new(99)));
}

#[tokio::test]
async fn match_option_policy_rejects_free_text() {
    let test = single_section(1, 10);
    let storage = storage_with(&[test.clone()]).await;
    let config = SessionConfig {
        answer_policy: AnswerPolicy::MatchOption,
        ..SessionConfig::default()
    };
    let workflow =
        AppServices::from_storage(storage, Clock::fixed(fixed_now()), config).workflow();

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    let err = workflow.answer(&mut live, 0, "E").unwrap_err();
    assert!(matches!(
        err,
        SessionError::State(SessionStateError::InvalidAnswer { .. })
    ));
    workflow.answer(&mut live, 0, "D").unwrap();
}

//
// ─── FAILURE PATHS ─────────────────────────────────────────────────────────────
//

/// Progress store that can be switched offline.
struct SwitchableProgress {
    inner: Arc<dyn ProgressRepository>,
    offline: AtomicBool,
}

#[async_trait]
impl ProgressRepository for SwitchableProgress {
    async fn get_progress(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        self.inner.get_progress(user_id, test_id).await
    }

    async fn save_progress(
        &self,
        record: &ProgressRecord,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("offline".into()));
        }
        self.inner.save_progress(record, expected_version).await
    }

    async fn delete_progress(
        &self,
        user_id: UserId,
        test_id: TestId,
    ) -> Result<bool, StorageError> {
        self.inner.delete_progress(user_id, test_id).await
    }
}

/// Scorer that fails a set number of times before delegating.
struct FlakyScorer {
    inner: LocalScorer,
    failures_left: AtomicU32,
    seen: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl Scorer for FlakyScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreReport, ScoringError> {
        self.seen.lock().unwrap().push(request.answers.clone());
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(ScoringError::Storage(StorageError::Connection(
                "scorer offline".into(),
            )));
        }
        self.inner.score(request).await
    }
}

/// Scorer standing in for an external service: it grades but stores nothing.
struct ExternalScorer {
    calls: AtomicU32,
}

#[async_trait]
impl Scorer for ExternalScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreReport, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ScoreReport {
            score: 1,
            total_questions: 5,
            percentage: 20.0,
            time_taken_secs: request.time_taken_seconds,
            reviews: Vec::new(),
        })
    }
}

struct SlowScorer;

#[async_trait]
impl Scorer for SlowScorer {
    async fn score(&self, _request: &ScoreRequest) -> Result<ScoreReport, ScoringError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(ScoringError::UnknownTest(TestId::new(0)))
    }
}

fn workflow_with(
    storage: &Storage,
    progress: Arc<dyn ProgressRepository>,
    scorer: Arc<dyn Scorer>,
) -> SessionWorkflowService {
    SessionWorkflowService::new(
        Clock::fixed(fixed_now()),
        SessionConfig::default(),
        Arc::clone(&storage.tests),
        progress,
        Arc::clone(&storage.submissions),
        Arc::new(SubmissionAccessGuard::new(Arc::clone(&storage.submissions))),
        scorer,
    )
}

fn local_scorer(storage: &Storage) -> LocalScorer {
    LocalScorer::new(Arc::clone(&storage.tests))
}

#[tokio::test]
async fn failed_save_and_exit_leaves_session_running() {
    let test = single_section(1, 100);
    let storage = storage_with(&[test.clone()]).await;
    let progress = Arc::new(SwitchableProgress {
        inner: Arc::clone(&storage.progress),
        offline: AtomicBool::new(false),
    });
    let workflow = workflow_with(&storage, progress.clone(), Arc::new(local_scorer(&storage)));

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    progress.offline.store(true, Ordering::SeqCst);

    let err = workflow.save_and_exit(&mut live).await.unwrap_err();
    assert!(matches!(err, SessionError::Persistence(_)));
    assert!(err.is_retryable());
    assert_eq!(live.state().status(), SessionStatus::InProgress);
    workflow.answer(&mut live, 0, "A").unwrap();

    progress.offline.store(false, Ordering::SeqCst);
    workflow.save_and_exit(&mut live).await.unwrap();
    assert_eq!(live.state().status(), SessionStatus::Paused);
}

#[tokio::test]
async fn finalize_retry_sends_the_cached_answers() {
    let test = single_section(1, 10);
    let storage = storage_with(&[test.clone()]).await;
    let scorer = Arc::new(FlakyScorer {
        inner: local_scorer(&storage),
        failures_left: AtomicU32::new(1),
        seen: Mutex::new(Vec::new()),
    });
    let workflow = workflow_with(&storage, Arc::clone(&storage.progress), scorer.clone());

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.answer(&mut live, 1, "B").unwrap();
    workflow.submit_module(&mut live).await.unwrap();
    workflow.answer(&mut live, 0, "D").unwrap();
    workflow.submit_module(&mut live).await.unwrap();

    let err = workflow.finalize(&mut live).await.unwrap_err();
    assert!(matches!(err, SessionError::Scoring(_)));
    assert!(err.is_retryable());
    assert_eq!(live.state().status(), SessionStatus::InProgress);
    assert_eq!(live.state().phase(), SessionPhase::AwaitingScore);
    assert_eq!(
        live.pending_answers(),
        Some(&["", "B", "", "D", ""].map(String::from)[..])
    );

    let report = workflow.finalize(&mut live).await.unwrap();
    assert_eq!(report.score, 2);
    assert_eq!(live.state().status(), SessionStatus::Completed);

    let seen = scorer.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}

#[tokio::test]
async fn external_scoring_blocks_reentry_even_if_terminal_save_fails() {
    let test = single_section(1, 10);
    let storage = storage_with(&[test.clone()]).await;
    let progress = Arc::new(SwitchableProgress {
        inner: Arc::clone(&storage.progress),
        offline: AtomicBool::new(false),
    });
    let scorer = Arc::new(ExternalScorer {
        calls: AtomicU32::new(0),
    });
    let workflow = workflow_with(&storage, progress.clone(), scorer.clone());

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.answer(&mut live, 0, "A").unwrap();
    workflow.submit_module(&mut live).await.unwrap();
    workflow.submit_module(&mut live).await.unwrap();

    progress.offline.store(true, Ordering::SeqCst);
    let report = workflow.finalize(&mut live).await.unwrap();
    assert_eq!(report.score, 1);
    assert_eq!(live.state().status(), SessionStatus::Completed);

    // The saved snapshot still says AwaitingScore, but the submission is recorded.
    progress.offline.store(false, Ordering::SeqCst);
    let stored = storage
        .progress
        .get_progress(USER, test.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.phase, "awaiting_score");
    let submission = storage
        .submissions
        .get_submission(USER, test.id())
        .await
        .unwrap()
        .expect("submission recorded by the workflow");
    assert_eq!(submission.answers, ["A", "", "", "", ""]);
    assert_eq!(submission.report, report);

    let err = workflow.open(USER, test.id()).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyCompleted { .. }));
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
}

fn earlier_submission(test_id: TestId, answers: &[&str], score: u32) -> Submission {
    Submission {
        user_id: USER,
        test_id,
        answers: answers.iter().map(|a| (*a).to_string()).collect(),
        report: ScoreReport {
            score,
            total_questions: 5,
            percentage: 0.0,
            time_taken_secs: 0,
            reviews: Vec::new(),
        },
        submitted_at: fixed_now(),
    }
}

#[tokio::test]
async fn finalize_reuses_a_matching_recorded_submission() {
    let test = single_section(1, 10);
    let storage = storage_with(&[test.clone()]).await;
    let workflow = workflow_at(&storage, fixed_now());

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.submit_module(&mut live).await.unwrap();
    workflow.submit_module(&mut live).await.unwrap();

    // An earlier finalize stored this attempt but its response never arrived.
    storage
        .submissions
        .insert_submission(&earlier_submission(test.id(), &["", "", "", "", ""], 4))
        .await
        .unwrap();

    let report = workflow.finalize(&mut live).await.unwrap();
    assert_eq!(report.score, 4);
    assert_eq!(live.state().status(), SessionStatus::Completed);
}

#[tokio::test]
async fn finalize_refuses_when_a_different_attempt_was_recorded() {
    let test = single_section(1, 10);
    let storage = storage_with(&[test.clone()]).await;
    let workflow = workflow_at(&storage, fixed_now());

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.submit_module(&mut live).await.unwrap();
    workflow.submit_module(&mut live).await.unwrap();

    storage
        .submissions
        .insert_submission(&earlier_submission(test.id(), &["A", "B", "C", "D", "A"], 5))
        .await
        .unwrap();

    let err = workflow.finalize(&mut live).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyCompleted { .. }));
    assert!(!err.is_retryable());
    assert!(!live.state().is_completed());
}

#[tokio::test(start_paused = true)]
async fn slow_scorer_times_out() {
    let test = single_section(1, 10);
    let storage = storage_with(&[test.clone()]).await;
    let workflow = workflow_with(&storage, Arc::clone(&storage.progress), Arc::new(SlowScorer));

    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.submit_module(&mut live).await.unwrap();
    workflow.submit_module(&mut live).await.unwrap();

    let err = workflow.finalize(&mut live).await.unwrap_err();
    assert!(matches!(err, SessionError::Timeout { operation: "scoring" }));
    assert!(err.is_retryable());
    assert!(!live.state().is_completed());
}

#[tokio::test]
async fn sqlite_backed_session_resumes_across_services() {
    let db = "sqlite:file:memdb_services_flow?mode=memory&cache=shared";
    let test = single_section(5, 100);
    let t0 = fixed_now();

    let first = AppServices::new_sqlite(db, Clock::fixed(t0), SessionConfig::default())
        .await
        .unwrap();
    first.storage().tests.upsert_test(&test).await.unwrap();
    let workflow = first.workflow();
    let mut live = workflow.open(USER, test.id()).await.unwrap();
    workflow.answer(&mut live, 2, "C").unwrap();
    workflow.toggle_review(&mut live, 1).unwrap();
    workflow.checkpoint(&mut live).await.unwrap();

    let later = AppServices::new_sqlite(
        db,
        Clock::fixed(t0 + ChronoDuration::seconds(40)),
        SessionConfig::default(),
    )
    .await
    .unwrap();
    let resumed = later.workflow().open(USER, test.id()).await.unwrap();
    assert_eq!(resumed.state().remaining_seconds(), 60);
    assert_eq!(resumed.state().current_answers(), ["", "", "C"]);
    assert!(resumed.state().is_flagged(ModuleKey::new(0, 0), 1));
}
