use serde::{Deserialize, Serialize};

use crate::create_timestamp;
use crate::executor::{COMPILE_TIMEOUT_MESSAGE, CodeRunner, RunOutcome, RunRequest};

/// Terminal classification of a submission
///
/// The string forms are part of the external contract and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pending,
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "System Error")]
    SystemError,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "Wrong Answer",
            Self::TimeLimitExceeded => "Time Limit Exceeded",
            Self::RuntimeError => "Runtime Error",
            Self::CompilationError => "Compilation Error",
            Self::MemoryLimitExceeded => "Memory Limit Exceeded",
            Self::SystemError => "System Error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Accepted" => Some(Self::Accepted),
            "Wrong Answer" => Some(Self::WrongAnswer),
            "Time Limit Exceeded" => Some(Self::TimeLimitExceeded),
            "Runtime Error" => Some(Self::RuntimeError),
            "Compilation Error" => Some(Self::CompilationError),
            "Memory Limit Exceeded" => Some(Self::MemoryLimitExceeded),
            "System Error" => Some(Self::SystemError),
            _ => None,
        }
    }

    /// Maps a non-passing executor outcome to its verdict
    ///
    /// An empty test-case input is a problem-data fault, not the submitter's,
    /// and is reported as a runtime error with the policy message preserved.
    fn from_outcome(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Success => Self::Accepted,
            RunOutcome::CompilationError => Self::CompilationError,
            RunOutcome::RuntimeError => Self::RuntimeError,
            RunOutcome::Timeout => Self::TimeLimitExceeded,
            RunOutcome::InvalidInput => Self::RuntimeError,
            RunOutcome::SystemError => Self::SystemError,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One test case of a problem, owned by the persistence layer
///
/// Test cases are always iterated in ascending id order so the first failing
/// case is deterministic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub input: String,
    pub expected_output: String,
    /// Sample cases are visible to end users, the rest judge-only
    pub sample: bool,
}

/// A submission and its judging state, mirrored in the submissions table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: i64,
    pub code: String,
    pub language: String,
    pub status: Verdict,
    /// Stdout of the failing (or last) case
    pub output: String,
    pub error: String,
    /// Total wall-clock seconds summed over attempted cases
    pub execution_time: f64,
    pub memory_used_kb: u32,
    pub test_cases_passed: u32,
    pub test_cases_total: u32,
    pub created_at: String,
    pub judged_at: Option<String>,
}

impl SubmissionRecord {
    /// Resets judging state so a fresh session starts from `Pending`
    pub fn reset_for_judging(&mut self) {
        self.status = Verdict::Pending;
        self.output.clear();
        self.error.clear();
        self.execution_time = 0.0;
        self.memory_used_kb = 0;
        self.test_cases_passed = 0;
        self.test_cases_total = 0;
        self.judged_at = None;
    }
}

/// Output comparison: exact equality after trimming leading/trailing
/// whitespace; internal whitespace is significant
fn outputs_match(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}

/// Judges one submission against its ordered test-case set
///
/// Runs the cases strictly sequentially through the executor, stops at the
/// first non-passing case and writes the terminal verdict plus accumulated
/// timing and pass counts into the submission record. The reported execution
/// time is the sum over all attempted cases. This function always leaves the
/// record in a terminal, judged state.
pub fn judge_submission(
    runner: &dyn CodeRunner,
    submission: &mut SubmissionRecord,
    time_limit: f64,
    test_cases: &[TestCase],
) {
    submission.test_cases_total = test_cases.len() as u32;

    if test_cases.is_empty() {
        submission.status = Verdict::RuntimeError;
        submission.error = "No test cases found for this problem".to_string();
        submission.judged_at = Some(create_timestamp());
        return;
    }

    let mut total_time = 0.0_f64;
    let mut max_memory_kb = 0_u32;
    let mut passed = 0_u32;

    for test_case in test_cases {
        let result = runner.run(&RunRequest {
            language: submission.language.clone(),
            code: submission.code.clone(),
            stdin: test_case.input.clone(),
            time_limit,
        });

        total_time += result.elapsed.as_secs_f64();
        max_memory_kb = max_memory_kb.max(result.memory_kb);

        if result.outcome == RunOutcome::Success
            && outputs_match(&result.stdout, &test_case.expected_output)
        {
            passed += 1;
            continue;
        }

        // A successful run with mismatched output is a wrong answer; any
        // other outcome maps directly. Later cases are never attempted.
        submission.status = if result.outcome == RunOutcome::Success {
            Verdict::WrongAnswer
        } else {
            Verdict::from_outcome(result.outcome)
        };
        submission.output = result.stdout.trim().to_string();
        submission.error = result.error;
        submission.execution_time = total_time;
        submission.memory_used_kb = max_memory_kb;
        submission.test_cases_passed = passed;
        submission.judged_at = Some(create_timestamp());
        return;
    }

    submission.status = Verdict::Accepted;
    submission.output.clear();
    submission.error.clear();
    submission.execution_time = total_time;
    submission.memory_used_kb = max_memory_kb;
    submission.test_cases_passed = passed;
    submission.judged_at = Some(create_timestamp());
}

/// Judges a submission, re-running the whole session at most once when the
/// compile step itself timed out
///
/// A compile-stage timeout usually means the build host was overloaded, not
/// that the code is wrong, so one fresh session is worth attempting. This is
/// caller-level policy around `judge_submission`, not an engine invariant.
pub fn judge_with_retry(
    runner: &dyn CodeRunner,
    submission: &mut SubmissionRecord,
    time_limit: f64,
    test_cases: &[TestCase],
) {
    judge_submission(runner, submission, time_limit, test_cases);

    if submission.status == Verdict::CompilationError && submission.error == COMPILE_TIMEOUT_MESSAGE
    {
        log::warn!(
            "Submission {} hit a compile-stage timeout, retrying once",
            submission.id
        );
        submission.reset_for_judging();
        judge_submission(runner, submission, time_limit, test_cases);
    }
}
