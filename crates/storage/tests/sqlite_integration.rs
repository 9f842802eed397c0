use chrono::Duration;
use prep_core::model::{
    AnswerPolicy, ModuleDraft, QuestionDraft, ScoreReport, SectionDraft, SessionPhase,
    SessionState, Submission, TestDefinition, TestDefinitionDraft, TestId, UserId,
};
use prep_core::scoring::grade;
use prep_core::time::fixed_now;
use storage::record::ProgressRecord;
use storage::repository::{
    ProgressRepository, Storage, StorageError, SubmissionRepository, TestDefinitionRepository,
};
use storage::sqlite::SqliteRepository;

fn build_test(id: u64) -> TestDefinition {
    let q = |p: &str, c: &str| QuestionDraft::new(p, &["A", "B", "C", "D"], c);
    TestDefinitionDraft {
        id: TestId::new(id),
        title: "SAT Practice".into(),
        kind: Default::default(),
        sections: vec![
            SectionDraft {
                name: "Reading and Writing".into(),
                break_seconds: 600,
                modules: vec![ModuleDraft {
                    name: "Module 1".into(),
                    timer_seconds: 1920,
                    questions: vec![q("1", "A"), q("2", "B")],
                }],
            },
            SectionDraft {
                name: "Math".into(),
                break_seconds: 0,
                modules: vec![ModuleDraft {
                    name: "Module 1".into(),
                    timer_seconds: 2100,
                    questions: vec![q("3", "C")],
                }],
            },
        ],
    }
    .validate()
    .unwrap()
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrips_test_definitions() {
    let repo = connect("memdb_tests").await;
    let test = build_test(1);
    repo.upsert_test(&test).await.unwrap();
    // Upserting twice replaces rather than duplicates.
    repo.upsert_test(&test).await.unwrap();

    let fetched = repo.get_test(test.id()).await.unwrap().expect("stored");
    assert_eq!(fetched, test);
    assert!(repo.get_test(TestId::new(99)).await.unwrap().is_none());
    assert_eq!(repo.list_tests(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_progress_is_versioned_and_lossless() {
    let repo = connect("memdb_progress").await;
    let test = build_test(1);
    repo.upsert_test(&test).await.unwrap();

    let user = UserId::new(5);
    let mut state = SessionState::start(&test, fixed_now()).unwrap();
    state.answer(&test, 0, "A", AnswerPolicy::Permissive).unwrap();
    state.toggle_review(&test, 1).unwrap();
    state.toggle_strike(&test, 0, 3).unwrap();

    let record = ProgressRecord::from_state(user, test.id(), &state);
    let v1 = repo.save_progress(&record, None).await.unwrap();
    assert_eq!(v1, 1);
    assert!(matches!(
        repo.save_progress(&record, None).await,
        Err(StorageError::Conflict)
    ));

    let fetched = repo.get_progress(user, test.id()).await.unwrap().unwrap();
    assert_eq!(fetched.version, 1);
    assert_eq!(fetched.clone().into_state().unwrap(), state);

    state.submit_module(&test).unwrap();
    assert_eq!(state.phase(), SessionPhase::Break);
    let record = ProgressRecord::from_state(user, test.id(), &state);
    let v2 = repo.save_progress(&record, Some(v1)).await.unwrap();
    assert_eq!(v2, 2);
    assert!(matches!(
        repo.save_progress(&record, Some(v1)).await,
        Err(StorageError::Conflict)
    ));

    let fetched = repo.get_progress(user, test.id()).await.unwrap().unwrap();
    assert_eq!(fetched.phase, "break");
    assert_eq!(fetched.into_state().unwrap(), state);

    assert!(repo.delete_progress(user, test.id()).await.unwrap());
    assert!(!repo.delete_progress(user, test.id()).await.unwrap());
}

#[tokio::test]
async fn sqlite_submissions_are_unique_per_user_and_test() {
    let repo = connect("memdb_submissions").await;
    let first = build_test(1);
    let second = build_test(2);
    repo.upsert_test(&first).await.unwrap();
    repo.upsert_test(&second).await.unwrap();

    let user = UserId::new(5);
    let answers = vec!["A".to_string(), "C".to_string(), "C".to_string()];
    let report: ScoreReport = grade(&first, &answers, 120);
    let submission = Submission {
        user_id: user,
        test_id: first.id(),
        answers: answers.clone(),
        report,
        submitted_at: fixed_now(),
    };
    repo.insert_submission(&submission).await.unwrap();
    assert!(matches!(
        repo.insert_submission(&submission).await,
        Err(StorageError::Conflict)
    ));

    let later = Submission {
        test_id: second.id(),
        submitted_at: fixed_now() + Duration::hours(1),
        report: grade(&second, &answers, 60),
        ..submission.clone()
    };
    repo.insert_submission(&later).await.unwrap();

    let fetched = repo.get_submission(user, first.id()).await.unwrap().unwrap();
    assert_eq!(fetched, submission);
    assert_eq!(fetched.report.score, 2);

    let listed = repo.list_submissions(user, 10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].test_id, second.id());
    assert!(repo.list_submissions(UserId::new(6), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn storage_sqlite_wires_all_repositories() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    let test = build_test(3);
    storage.tests.upsert_test(&test).await.unwrap();
    assert!(storage.tests.get_test(test.id()).await.unwrap().is_some());
    assert!(
        storage
            .progress
            .get_progress(UserId::new(1), test.id())
            .await
            .unwrap()
            .is_none()
    );
}
