use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use oj_engine::config::{ProblemSeed, TestCaseSeed};
use oj_engine::database as db;
use oj_engine::executor::Executor;
use oj_engine::judge::{SubmissionRecord, TestCase, Verdict, judge_submission};
use oj_engine::queue::{JobQueue, JudgeMessage};
use oj_engine::sandbox::LocalBackend;
use oj_engine::worker::worker;

const A_PLUS_B: &str = "print(sum(map(int, input().split())))";

fn python_available() -> bool {
    std::process::Command::new("which")
        .arg("python3")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn local_executor() -> Executor {
    Executor::new(Arc::new(LocalBackend::new()), 262144)
}

fn test_case(id: i64, input: &str, expected: &str) -> TestCase {
    TestCase {
        id,
        input: input.to_string(),
        expected_output: expected.to_string(),
        sample: false,
    }
}

fn pending_submission(code: &str) -> SubmissionRecord {
    SubmissionRecord {
        id: 1,
        user_id: 0,
        problem_id: 1,
        code: code.to_string(),
        language: "python".to_string(),
        status: Verdict::Pending,
        output: String::new(),
        error: String::new(),
        execution_time: 0.0,
        memory_used_kb: 0,
        test_cases_passed: 0,
        test_cases_total: 0,
        created_at: oj_engine::create_timestamp(),
        judged_at: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_accepted_submission_end_to_end() {
    if !python_available() {
        return;
    }

    let cases = vec![
        test_case(1, "2 3\n", "5"),
        test_case(2, "10 -10\n", "0"),
        test_case(3, "100 200\n", "300"),
    ];
    let mut submission = pending_submission(A_PLUS_B);

    let judged = tokio::task::spawn_blocking(move || {
        let executor = local_executor();
        judge_submission(&executor, &mut submission, 5.0, &cases);
        submission
    })
    .await
    .unwrap();

    assert_eq!(judged.status, Verdict::Accepted);
    assert_eq!(judged.test_cases_passed, 3);
    assert_eq!(judged.test_cases_total, 3);
    // Reported time is the sum over all attempted cases
    assert!(judged.execution_time > 0.0);
    assert!(judged.judged_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wrong_answer_stops_on_the_deliberately_wrong_case() {
    if !python_available() {
        return;
    }

    let cases = vec![
        test_case(1, "2 3\n", "5"),
        test_case(2, "10 -10\n", "0"),
        test_case(3, "1 1\n", "3"), // deliberately wrong expectation
    ];
    let mut submission = pending_submission(A_PLUS_B);

    let judged = tokio::task::spawn_blocking(move || {
        let executor = local_executor();
        judge_submission(&executor, &mut submission, 5.0, &cases);
        submission
    })
    .await
    .unwrap();

    assert_eq!(judged.status, Verdict::WrongAnswer);
    assert_eq!(judged.test_cases_passed, 2);
    assert_eq!(judged.test_cases_total, 3);
    assert_eq!(judged.output, "2");
}

/// A submission whose problem has vanished must still leave `Pending`, so a
/// stuck record is always diagnosable from its terminal state.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_marks_a_submission_with_a_missing_problem_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::init_db(dir.path().join("test.sqlite3")).await.unwrap();
    let pool = Arc::new(pool);

    // Bypass the foreign key on one connection to model a vanished problem
    let mut conn = pool.acquire().await.unwrap();
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(conn.as_mut())
        .await
        .unwrap();
    let submission_id = sqlx::query(
        "INSERT INTO submissions (user_id, problem_id, code, language, status, created_at)
         VALUES (0, 999, 'print(1)', 'python', 'Pending', ?)",
    )
    .bind(oj_engine::create_timestamp())
    .execute(conn.as_mut())
    .await
    .unwrap()
    .last_insert_rowid();
    drop(conn);

    let executor = Arc::new(local_executor());
    let queue = Arc::new(JobQueue::new());
    let token = CancellationToken::new();
    let worker_handle = tokio::spawn(worker(
        1,
        executor,
        pool.clone(),
        queue.clone(),
        token.clone(),
    ));

    queue
        .push(JudgeMessage::FireAndForget { submission_id })
        .await;

    let mut status = Verdict::Pending;
    for _ in 0..100 {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let stored = db::fetch_submission(submission_id, pool.clone())
            .await
            .unwrap()
            .unwrap();
        if stored.status != Verdict::Pending {
            status = stored.status;
            break;
        }
    }
    assert_eq!(status, Verdict::RuntimeError);

    token.cancel();
    worker_handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_judges_a_blocking_submission() {
    if !python_available() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let pool = db::init_db(dir.path().join("test.sqlite3")).await.unwrap();
    db::seed_problems(
        &pool,
        &[ProblemSeed {
            id: 1,
            title: "A + B".to_string(),
            time_limit: 5.0,
            test_cases: vec![
                TestCaseSeed {
                    input: "2 3\n".to_string(),
                    expected_output: "5\n".to_string(),
                    sample: true,
                },
                TestCaseSeed {
                    input: "10 -10\n".to_string(),
                    expected_output: "0\n".to_string(),
                    sample: false,
                },
            ],
        }],
    )
    .await
    .unwrap();
    let pool = Arc::new(pool);

    let submission_id = db::create_submission(0, 1, A_PLUS_B, "python", pool.clone())
        .await
        .unwrap();

    let executor = Arc::new(local_executor());
    let queue = Arc::new(JobQueue::new());
    let token = CancellationToken::new();
    let worker_handle = tokio::spawn(worker(
        1,
        executor,
        pool.clone(),
        queue.clone(),
        token.clone(),
    ));

    let (tx, rx) = tokio::sync::oneshot::channel();
    queue
        .push(JudgeMessage::Blocking {
            submission_id,
            responder: tx,
        })
        .await;

    let judged = rx.await.unwrap();
    assert_eq!(judged.status, Verdict::Accepted);
    assert_eq!(judged.test_cases_passed, 2);

    // The verdict was persisted and the accepted submission fed the stats
    let stored = db::fetch_submission(submission_id, pool.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, Verdict::Accepted);

    let solved: i64 = sqlx::query_scalar("SELECT solved_count FROM user_stats WHERE user_id = 0")
        .fetch_one(pool.as_ref())
        .await
        .unwrap();
    assert_eq!(solved, 1);

    token.cancel();
    worker_handle.await.unwrap().unwrap();
}
