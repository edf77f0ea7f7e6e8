use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::config::ProblemSeed;
use crate::create_timestamp;
use crate::judge::{SubmissionRecord, TestCase, Verdict};

const DATABASE_NAME: &str = "oj-engine.sqlite3";

pub fn get_db_path() -> PathBuf {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("", "", "oj-engine").expect("Unable to find user directory");
    let data_dir = proj_dirs.data_local_dir();

    fs::create_dir_all(data_dir).expect("Failed to create local data dir");

    data_dir.join(DATABASE_NAME)
}

pub async fn init_db(db_path: impl AsRef<Path>) -> sqlx::Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display()); // rwc = read/write/create
    let db_pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await?;

    // PRAGMA statements cannot run inside a transaction
    for pragma_sql in &[
        "PRAGMA foreign_keys = ON;",
        "PRAGMA busy_timeout = 2000;", // 2 seconds timeout for lock contention
        "PRAGMA journal_mode = WAL;",  // Write-Ahead Logging for better concurrency
        "PRAGMA synchronous = NORMAL;",
    ] {
        sqlx::query(pragma_sql).execute(&db_pool).await?;
    }

    let mut tx = db_pool.begin().await?;

    for sql in &[
        r"
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY,
            name          TEXT    NOT NULL UNIQUE
        );",
        r"
        CREATE TABLE IF NOT EXISTS user_stats (
            user_id           INTEGER PRIMARY KEY,
            solved_count      INTEGER NOT NULL DEFAULT 0,
            last_accepted_at  TEXT,
            FOREIGN KEY (user_id) REFERENCES users (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS problems (
            id            INTEGER PRIMARY KEY,
            title         TEXT    NOT NULL,
            time_limit    REAL    NOT NULL
        );",
        r"
        CREATE TABLE IF NOT EXISTS test_cases (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            problem_id       INTEGER NOT NULL,
            input            TEXT    NOT NULL,
            expected_output  TEXT    NOT NULL,
            sample           INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (problem_id) REFERENCES problems (id)
        );",
        "CREATE INDEX IF NOT EXISTS idx_test_cases_problem ON test_cases(problem_id, id);",
        r"
        CREATE TABLE IF NOT EXISTS submissions (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id            INTEGER NOT NULL,
            problem_id         INTEGER NOT NULL,
            code               TEXT    NOT NULL,
            language           TEXT    NOT NULL,
            status             TEXT    NOT NULL,
            output             TEXT    NOT NULL DEFAULT '',
            error              TEXT    NOT NULL DEFAULT '',
            execution_time     REAL    NOT NULL DEFAULT 0.0,
            memory_used_kb     INTEGER NOT NULL DEFAULT 0,
            test_cases_passed  INTEGER NOT NULL DEFAULT 0,
            test_cases_total   INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT    NOT NULL,
            judged_at          TEXT,
            FOREIGN KEY (user_id)    REFERENCES users (id),
            FOREIGN KEY (problem_id) REFERENCES problems (id)
        );",
        "INSERT OR IGNORE INTO users (id, name) VALUES (0, 'root');",
    ] {
        sqlx::query(sql).execute(tx.as_mut()).await?;
    }

    tx.commit().await?;

    log::info!("Initialized database at {}", db_path.as_ref().display());

    Ok(db_pool)
}

pub fn remove_db(db_path: impl AsRef<Path>) {
    // Remove WAL and SHM files (ignore errors as they might not exist)
    let wal_path = format!("{}-wal", db_path.as_ref().display());
    let shm_path = format!("{}-shm", db_path.as_ref().display());
    let _ = fs::remove_file(wal_path);
    let _ = fs::remove_file(shm_path);

    if let Err(e) = std::fs::remove_file(&db_path) {
        log::warn!(
            "Unable to remove database at {}: {e}",
            db_path.as_ref().display()
        );
    } else {
        log::info!("Removed database at {}", db_path.as_ref().display());
    }
}

/// Loads the configured problems and their test cases into the database
///
/// Existing test cases of a seeded problem are replaced so re-running the
/// server with an updated config does not accumulate duplicates.
pub async fn seed_problems(pool: &SqlitePool, problems: &[ProblemSeed]) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    for problem in problems {
        sqlx::query("INSERT OR REPLACE INTO problems (id, title, time_limit) VALUES (?, ?, ?)")
            .bind(problem.id)
            .bind(&problem.title)
            .bind(problem.time_limit)
            .execute(tx.as_mut())
            .await?;

        sqlx::query("DELETE FROM test_cases WHERE problem_id = ?")
            .bind(problem.id)
            .execute(tx.as_mut())
            .await?;

        // Insertion order defines the stable judging order
        for case in &problem.test_cases {
            sqlx::query(
                "INSERT INTO test_cases (problem_id, input, expected_output, sample) VALUES (?, ?, ?, ?)",
            )
            .bind(problem.id)
            .bind(&case.input)
            .bind(&case.expected_output)
            .bind(case.sample)
            .execute(tx.as_mut())
            .await?;
        }
    }

    tx.commit().await?;

    log::info!("Seeded {} problem(s)", problems.len());
    Ok(())
}

pub async fn find_user(id: i64, pool: Arc<SqlitePool>) -> sqlx::Result<bool> {
    let result = sqlx::query("SELECT 1 FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?;

    Ok(result.is_some())
}

/// The per-case time limit of a problem, `None` when the problem is unknown
pub async fn problem_time_limit(id: i64, pool: Arc<SqlitePool>) -> sqlx::Result<Option<f64>> {
    let row = sqlx::query("SELECT time_limit FROM problems WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?;

    row.map(|r| r.try_get("time_limit")).transpose()
}

/// Creates a pending submission and returns its id
pub async fn create_submission(
    user_id: i64,
    problem_id: i64,
    code: &str,
    language: &str,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<i64> {
    let now = create_timestamp();

    let result = sqlx::query(
        r"
        INSERT INTO submissions (user_id, problem_id, code, language, status, created_at)
        VALUES (?, ?, ?, ?, 'Pending', ?)
        ",
    )
    .bind(user_id)
    .bind(problem_id)
    .bind(code)
    .bind(language)
    .bind(now)
    .execute(pool.as_ref())
    .await?;

    Ok(result.last_insert_rowid())
}

fn submission_from_row(row: &SqliteRow) -> sqlx::Result<SubmissionRecord> {
    let status: String = row.try_get("status")?;
    Ok(SubmissionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        problem_id: row.try_get("problem_id")?,
        code: row.try_get("code")?,
        language: row.try_get("language")?,
        status: Verdict::from_str(&status).unwrap_or(Verdict::Pending),
        output: row.try_get("output")?,
        error: row.try_get("error")?,
        execution_time: row.try_get("execution_time")?,
        memory_used_kb: row.try_get::<i64, _>("memory_used_kb")? as u32,
        test_cases_passed: row.try_get::<i64, _>("test_cases_passed")? as u32,
        test_cases_total: row.try_get::<i64, _>("test_cases_total")? as u32,
        created_at: row.try_get("created_at")?,
        judged_at: row.try_get("judged_at")?,
    })
}

pub async fn fetch_submission(
    id: i64,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<Option<SubmissionRecord>> {
    let row = sqlx::query("SELECT * FROM submissions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?;

    row.as_ref().map(submission_from_row).transpose()
}

/// Test cases of a problem in the stable judging order (ascending id)
pub async fn fetch_test_cases(
    problem_id: i64,
    pool: Arc<SqlitePool>,
) -> sqlx::Result<Vec<TestCase>> {
    let rows = sqlx::query(
        "SELECT id, input, expected_output, sample FROM test_cases WHERE problem_id = ? ORDER BY id ASC",
    )
    .bind(problem_id)
    .fetch_all(pool.as_ref())
    .await?;

    rows.iter()
        .map(|row| {
            Ok(TestCase {
                id: row.try_get("id")?,
                input: row.try_get("input")?,
                expected_output: row.try_get("expected_output")?,
                sample: row.try_get("sample")?,
            })
        })
        .collect()
}

/// Writes the terminal judging state of a submission back to the database
pub async fn save_verdict(pool: Arc<SqlitePool>, submission: &SubmissionRecord) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE submissions
        SET status = ?, output = ?, error = ?, execution_time = ?, memory_used_kb = ?,
            test_cases_passed = ?, test_cases_total = ?, judged_at = ?
        WHERE id = ?
        ",
    )
    .bind(submission.status.as_str())
    .bind(&submission.output)
    .bind(&submission.error)
    .bind(submission.execution_time)
    .bind(submission.memory_used_kb as i64)
    .bind(submission.test_cases_passed as i64)
    .bind(submission.test_cases_total as i64)
    .bind(&submission.judged_at)
    .bind(submission.id)
    .execute(pool.as_ref())
    .await?;

    Ok(())
}

/// Marks a submission whose judging task itself failed; the record still
/// reaches a terminal state with a deliberately generic message
pub async fn mark_judging_failure(id: i64, pool: Arc<SqlitePool>) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE submissions
        SET status = 'Runtime Error', error = 'An unexpected judging system error occurred', judged_at = ?
        WHERE id = ?
        ",
    )
    .bind(create_timestamp())
    .bind(id)
    .execute(pool.as_ref())
    .await?;

    Ok(())
}

/// Recalculates the user's solve statistics after an accepted submission
///
/// The solved count is recomputed from distinct accepted problems, so
/// calling this more than once per submission is harmless.
pub async fn record_accepted(user_id: i64, pool: Arc<SqlitePool>) -> sqlx::Result<()> {
    sqlx::query(
        r"
        INSERT INTO user_stats (user_id, solved_count, last_accepted_at)
        VALUES (
            ?,
            (SELECT COUNT(DISTINCT problem_id) FROM submissions
             WHERE user_id = ? AND status = 'Accepted'),
            ?
        )
        ON CONFLICT(user_id) DO UPDATE SET
            solved_count = excluded.solved_count,
            last_accepted_at = excluded.last_accepted_at
        ",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(create_timestamp())
    .execute(pool.as_ref())
    .await?;

    Ok(())
}
