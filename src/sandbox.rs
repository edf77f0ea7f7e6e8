mod docker;
mod local;

pub use docker::DockerBackend;
pub use local::LocalBackend;

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::JudgeConfig;

/// Raw result of one compile-or-run step
///
/// Both backends produce the exact same shape; callers never need to know
/// which backend executed the step.
#[derive(Debug)]
pub struct Execution {
    /// Exit code of the process, `None` when it was killed
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time spent on this step
    pub elapsed: Duration,
    /// True when the step was killed by the time limit
    pub timed_out: bool,
    /// Peak memory in KB, 0 when the backend does not measure memory
    pub memory_kb: u32,
}

/// One compile-or-run step to execute in a sandbox
pub struct ExecStep<'a> {
    /// Container image for hardened mode, ignored by the local backend
    pub image: &'a str,
    pub command: &'a [String],
    pub work_dir: &'a Path,
    pub stdin: &'a str,
    pub time_limit: Duration,
    pub memory_limit_kb: u32,
}

/// Trait for the two interchangeable sandbox implementations
///
/// This trait abstracts the single capability the executor needs: run one
/// command in a working directory with a wall-clock time limit and report
/// what happened - from full container isolation down to a plain child
/// process without sandboxing.
pub trait SandboxBackend: Send + Sync {
    /// Executes a single compile-or-run step, blocking until it finishes
    /// or hits the time limit
    fn execute(&self, step: &ExecStep) -> Result<Execution>;

    /// True when this backend enforces memory and network containment
    fn hardened(&self) -> bool;
}

/// Creates the process-wide sandbox backend from the judge configuration
///
/// Hardened mode requires a working `docker` binary; when it is disabled in
/// the configuration or unavailable on the host, the local-process backend
/// keeps the judging path functional with reduced security guarantees.
/// Writes the step's stdin to the child and closes the pipe
///
/// A child may legitimately exit without draining its stdin; the resulting
/// broken pipe is not an execution failure.
pub(crate) async fn feed_stdin(
    child: &mut tokio::process::Child,
    input: &str,
) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(input.as_bytes()).await {
            Ok(()) => {
                let _ = stdin.shutdown().await;
            }
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

pub fn create_backend(config: &JudgeConfig) -> Arc<dyn SandboxBackend> {
    let docker_found = Command::new("which")
        .arg("docker")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);

    if config.hardened && docker_found {
        log::info!("Creating DockerBackend (hardened mode)");
        Arc::new(DockerBackend::new(config.pids_limit))
    } else {
        if config.hardened {
            log::warn!("Hardened mode requested but docker is unavailable");
        }
        log::info!("Creating LocalBackend (no isolation mode)");
        Arc::new(LocalBackend::new())
    }
}
