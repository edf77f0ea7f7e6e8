use std::sync::Arc;

use pretty_assertions::assert_eq;

use oj_engine::config::{ProblemSeed, TestCaseSeed};
use oj_engine::database as db;
use oj_engine::judge::Verdict;

fn seed_case(input: &str, expected: &str, sample: bool) -> TestCaseSeed {
    TestCaseSeed {
        input: input.to_string(),
        expected_output: expected.to_string(),
        sample,
    }
}

fn a_plus_b_problem() -> ProblemSeed {
    ProblemSeed {
        id: 1,
        title: "A + B".to_string(),
        time_limit: 2.0,
        test_cases: vec![
            seed_case("2 3\n", "5\n", true),
            seed_case("10 -10\n", "0\n", false),
            seed_case("100 200\n", "300\n", false),
        ],
    }
}

async fn setup() -> (Arc<sqlx::SqlitePool>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("test.sqlite3");
    let pool = db::init_db(&db_path).await.expect("Failed to init db");
    db::seed_problems(&pool, &[a_plus_b_problem()])
        .await
        .expect("Failed to seed problems");
    (Arc::new(pool), dir)
}

#[tokio::test]
async fn test_seeded_problem_is_queryable() {
    let (pool, _dir) = setup().await;

    let time_limit = db::problem_time_limit(1, pool.clone()).await.unwrap();
    assert_eq!(time_limit, Some(2.0));

    let missing = db::problem_time_limit(99, pool.clone()).await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_test_cases_come_back_in_stable_ascending_order() {
    let (pool, _dir) = setup().await;

    let cases = db::fetch_test_cases(1, pool.clone()).await.unwrap();
    assert_eq!(cases.len(), 3);
    assert!(cases.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(cases[0].input, "2 3\n");
    assert_eq!(cases[2].expected_output, "300\n");
    assert!(cases[0].sample);
    assert!(!cases[1].sample);
}

#[tokio::test]
async fn test_reseeding_replaces_test_cases_instead_of_duplicating() {
    let (pool, _dir) = setup().await;

    db::seed_problems(pool.as_ref(), &[a_plus_b_problem()])
        .await
        .unwrap();
    let cases = db::fetch_test_cases(1, pool.clone()).await.unwrap();
    assert_eq!(cases.len(), 3);
}

#[tokio::test]
async fn test_submission_lifecycle() {
    let (pool, _dir) = setup().await;

    let id = db::create_submission(0, 1, "print(1)", "python", pool.clone())
        .await
        .unwrap();

    let mut submission = db::fetch_submission(id, pool.clone())
        .await
        .unwrap()
        .expect("Submission should exist");
    assert_eq!(submission.status, Verdict::Pending);
    assert_eq!(submission.code, "print(1)");
    assert_eq!(submission.judged_at, None);

    submission.status = Verdict::WrongAnswer;
    submission.output = "2".to_string();
    submission.execution_time = 0.123;
    submission.test_cases_passed = 2;
    submission.test_cases_total = 3;
    submission.judged_at = Some(oj_engine::create_timestamp());
    db::save_verdict(pool.clone(), &submission).await.unwrap();

    let reloaded = db::fetch_submission(id, pool.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, Verdict::WrongAnswer);
    assert_eq!(reloaded.output, "2");
    assert_eq!(reloaded.test_cases_passed, 2);
    assert_eq!(reloaded.test_cases_total, 3);
    assert!(reloaded.judged_at.is_some());
}

#[tokio::test]
async fn test_unknown_submission_is_none() {
    let (pool, _dir) = setup().await;
    let missing = db::fetch_submission(42, pool.clone()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_mark_judging_failure_reaches_a_terminal_state() {
    let (pool, _dir) = setup().await;

    let id = db::create_submission(0, 1, "print(1)", "python", pool.clone())
        .await
        .unwrap();
    db::mark_judging_failure(id, pool.clone()).await.unwrap();

    let submission = db::fetch_submission(id, pool.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(submission.status, Verdict::RuntimeError);
    assert_eq!(submission.error, "An unexpected judging system error occurred");
    assert!(submission.judged_at.is_some());
}

#[tokio::test]
async fn test_record_accepted_is_idempotent() {
    let (pool, _dir) = setup().await;

    let id = db::create_submission(0, 1, "print(1)", "python", pool.clone())
        .await
        .unwrap();
    let mut submission = db::fetch_submission(id, pool.clone())
        .await
        .unwrap()
        .unwrap();
    submission.status = Verdict::Accepted;
    submission.judged_at = Some(oj_engine::create_timestamp());
    db::save_verdict(pool.clone(), &submission).await.unwrap();

    db::record_accepted(0, pool.clone()).await.unwrap();
    db::record_accepted(0, pool.clone()).await.unwrap();

    let solved: i64 = sqlx::query_scalar("SELECT solved_count FROM user_stats WHERE user_id = 0")
        .fetch_one(pool.as_ref())
        .await
        .unwrap();
    assert_eq!(solved, 1);
}
