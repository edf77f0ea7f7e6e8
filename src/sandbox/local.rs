use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use tokio::time::timeout;

use super::{ExecStep, Execution, SandboxBackend, feed_stdin};

/// A backend that executes steps as plain child processes without sandboxing
///
/// LocalBackend provides wall-clock timeout enforcement but no memory, file
/// system, network or permission controls. Memory usage is not measured and
/// is always reported as 0. This backend exists so the judging path stays
/// functional in environments without a container runtime; use only where
/// the absence of isolation is acceptable.
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        log::warn!("LocalBackend provides NO security isolation - use only in trusted environments");
        Self
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxBackend for LocalBackend {
    fn execute(&self, step: &ExecStep) -> Result<Execution> {
        if step.command.is_empty() {
            bail!("Empty command");
        }

        let start_time = Instant::now();
        let outcome = tokio::runtime::Handle::current().block_on(async {
            let mut cmd = tokio::process::Command::new(&step.command[0]);
            cmd.args(&step.command[1..])
                .current_dir(step.work_dir)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = cmd.spawn()?;

            // The stdin write happens inside the timed future: a child that
            // never reads its input must not stall past the limit. Dropping
            // the unfinished future kills the child via kill_on_drop.
            let timed = timeout(step.time_limit, async {
                feed_stdin(&mut child, step.stdin).await?;
                child.wait_with_output().await
            })
            .await;

            match timed {
                Ok(output) => anyhow::Ok(Some(output?)),
                Err(_) => anyhow::Ok(None),
            }
        })?;
        let elapsed = start_time.elapsed();

        let execution = match outcome {
            Some(output) => Execution {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                elapsed,
                timed_out: false,
                memory_kb: 0, // No memory tracking in local mode
            },
            None => Execution {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                elapsed,
                timed_out: true,
                memory_kb: 0,
            },
        };

        Ok(execution)
    }

    fn hardened(&self) -> bool {
        false
    }
}
