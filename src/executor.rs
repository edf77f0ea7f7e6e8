use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Serialize;

use crate::languages::{self, Language};
use crate::sandbox::{ExecStep, SandboxBackend};

// Fixed budget for the compile step, independent of the caller's time limit
const COMPILE_TIME_LIMIT: Duration = Duration::from_secs(30);
const COMPILE_MEMORY_LIMIT_KB: u32 = 262144;

/// Stable message for a timed-out compile step; the retry policy around
/// `judge_submission` keys off this exact text
pub const COMPILE_TIMEOUT_MESSAGE: &str = "Compilation timed out";

/// One execution attempt: language tag, source code, stdin and a wall-clock
/// time limit in seconds
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub language: String,
    pub code: String,
    pub stdin: String,
    pub time_limit: f64,
}

/// Classification of a single execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    CompilationError,
    RuntimeError,
    Timeout,
    InvalidInput,
    SystemError,
}

impl RunOutcome {
    /// The error-type tag exposed to external callers
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::CompilationError => "compilation_error",
            Self::RuntimeError => "runtime_error",
            Self::Timeout => "timeout",
            Self::InvalidInput => "invalid_input",
            Self::SystemError => "system_error",
        }
    }
}

/// Normalized result of one execution attempt
#[derive(Debug, Clone)]
pub struct RunResult {
    pub outcome: RunOutcome,
    /// Trimmed stdout, empty unless the outcome is `Success`
    pub stdout: String,
    /// Diagnostic message, empty when the outcome is `Success`
    pub error: String,
    pub elapsed: Duration,
    pub memory_kb: u32,
}

impl RunResult {
    fn success(stdout: String, elapsed: Duration, memory_kb: u32) -> Self {
        Self {
            outcome: RunOutcome::Success,
            stdout,
            error: String::new(),
            elapsed,
            memory_kb,
        }
    }

    fn failure(outcome: RunOutcome, error: String) -> Self {
        Self {
            outcome,
            stdout: String::new(),
            error,
            elapsed: Duration::ZERO,
            memory_kb: 0,
        }
    }
}

/// The seam between the judging orchestrator and the execution engine
///
/// `Executor` is the production implementation; tests drive the orchestrator
/// with scripted runners instead.
pub trait CodeRunner: Send + Sync {
    fn run(&self, request: &RunRequest) -> RunResult;
}

/// Drives a toolchain profile through the sandbox backend for one attempt
///
/// The executor never lets an error escape its boundary: every failure path
/// comes back as a classified `RunResult`.
pub struct Executor {
    backend: Arc<dyn SandboxBackend>,
    memory_limit_kb: u32,
}

impl Executor {
    pub fn new(backend: Arc<dyn SandboxBackend>, memory_limit_kb: u32) -> Self {
        Self {
            backend,
            memory_limit_kb,
        }
    }

    fn run_inner(&self, language: Language, request: &RunRequest) -> Result<RunResult> {
        if !request.time_limit.is_finite() || request.time_limit <= 0.0 {
            bail!("Time limit must be a positive number of seconds");
        }

        let profile = languages::profile(language);

        // Java names the source file after the public class; no recognizable
        // class declaration means nothing to hand to the compiler
        let class_name = match language {
            Language::Java => match languages::java_class_name(&request.code) {
                Some(name) => name,
                None => {
                    return Ok(RunResult::failure(
                        RunOutcome::CompilationError,
                        "No class found in Java code".to_string(),
                    ));
                }
            },
            _ => String::new(),
        };

        let code = match language {
            Language::Cpp => languages::expand_cpp_includes(&request.code),
            _ => request.code.clone(),
        };

        // The scoped temp directory is removed on every exit path, including
        // early returns and panics further up the stack
        let work_dir = tempfile::Builder::new().prefix("oj-run-").tempdir()?;
        let source_name = profile.source_file_name(&class_name);
        fs::write(work_dir.path().join(&source_name), format!("{code}\n"))?;

        if let Some(compile_command) = profile.resolved_compile_command(&class_name) {
            let compile_step = ExecStep {
                image: profile.compile_image,
                command: &compile_command,
                work_dir: work_dir.path(),
                stdin: "",
                time_limit: COMPILE_TIME_LIMIT,
                memory_limit_kb: COMPILE_MEMORY_LIMIT_KB,
            };
            let compiled = self.backend.execute(&compile_step)?;

            if compiled.timed_out {
                return Ok(RunResult::failure(
                    RunOutcome::CompilationError,
                    COMPILE_TIMEOUT_MESSAGE.to_string(),
                ));
            }
            if compiled.exit_code != Some(0) {
                let diagnostics = if compiled.stderr.trim().is_empty() {
                    compiled.stdout.trim().to_string()
                } else {
                    compiled.stderr.trim().to_string()
                };
                return Ok(RunResult::failure(
                    RunOutcome::CompilationError,
                    format!("Compilation Error:\n{diagnostics}"),
                ));
            }
        }

        let run_command = profile.resolved_run_command(&class_name);
        let run_step = ExecStep {
            image: profile.run_image,
            command: &run_command,
            work_dir: work_dir.path(),
            stdin: &request.stdin,
            time_limit: Duration::from_secs_f64(request.time_limit),
            memory_limit_kb: self.memory_limit_kb,
        };
        let execution = self.backend.execute(&run_step)?;

        let result = if execution.timed_out {
            RunResult {
                outcome: RunOutcome::Timeout,
                stdout: String::new(),
                error: format!(
                    "Time Limit Exceeded: execution took longer than {}s",
                    request.time_limit
                ),
                elapsed: execution.elapsed,
                memory_kb: execution.memory_kb,
            }
        } else if execution.exit_code == Some(0) {
            RunResult::success(
                execution.stdout.trim().to_string(),
                execution.elapsed,
                execution.memory_kb,
            )
        } else {
            let stderr = execution.stderr.trim();
            RunResult {
                outcome: RunOutcome::RuntimeError,
                stdout: String::new(),
                error: if stderr.is_empty() {
                    "Runtime error occurred".to_string()
                } else {
                    stderr.to_string()
                },
                elapsed: execution.elapsed,
                memory_kb: execution.memory_kb,
            }
        };

        Ok(result)
    }
}

impl CodeRunner for Executor {
    fn run(&self, request: &RunRequest) -> RunResult {
        // Policy rejection: the platform always expects at least a delimiter
        // line per test case, so empty stdin is refused before any execution
        if request.stdin.trim().is_empty() {
            return RunResult::failure(
                RunOutcome::InvalidInput,
                "Invalid test case: no input provided".to_string(),
            );
        }

        let Some(language) = Language::from_tag(&request.language) else {
            return RunResult::failure(
                RunOutcome::SystemError,
                format!("Unsupported language: {}", request.language),
            );
        };

        match self.run_inner(language, request) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Execution attempt failed outside the toolchain: {e:#}");
                if self.backend.hardened() {
                    // Keep internal paths and backend details out of user-visible output
                    RunResult::failure(
                        RunOutcome::SystemError,
                        "Execution failed due to an internal error".to_string(),
                    )
                } else {
                    RunResult::failure(RunOutcome::RuntimeError, format!("Execution failed: {e}"))
                }
            }
        }
    }
}
