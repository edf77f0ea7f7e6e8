use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Result, bail};
use tokio::time::{Duration, timeout};

use super::{ExecStep, Execution, SandboxBackend, feed_stdin};

/// Extra wall-clock budget for container startup and teardown, on top of
/// the caller's time limit
const STARTUP_GRACE: Duration = Duration::from_secs(2);

/// Exit status reported by docker when the process was killed by a limit
/// (timeout or the memory ceiling); mapped to a timeout, not a runtime error
const KILLED_EXIT_CODE: i32 = 137;

/// A backend that executes steps inside throwaway docker containers
///
/// Every step runs in a fresh container with networking disabled, a hard
/// memory ceiling and a cap on spawned processes. The working directory is
/// bind-mounted at `/box` inside the container so compile artifacts survive
/// between the compile and run steps of one execution attempt. Containers
/// that outlive the time limit are force-removed.
pub struct DockerBackend {
    pids_limit: u32,
    /// Monotonic counter making container names unique within this process
    sequence: AtomicU64,
}

impl DockerBackend {
    pub fn new(pids_limit: u32) -> Self {
        Self {
            pids_limit,
            sequence: AtomicU64::new(0),
        }
    }

    fn next_container_name(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("oj-engine-{}-{seq}", std::process::id())
    }

    fn docker_run_args(&self, step: &ExecStep, container_name: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "run",
            "--rm",
            "-i",
            "--name",
            container_name,
            "--network",
            "none",
        ]
        .map(String::from)
        .to_vec();

        args.push("--memory".to_string());
        args.push(format!("{}k", step.memory_limit_kb));
        args.push("--pids-limit".to_string());
        args.push(self.pids_limit.to_string());
        args.push("-v".to_string());
        args.push(format!("{}:/box", step.work_dir.display()));
        args.push("-w".to_string());
        args.push("/box".to_string());
        args.push(step.image.to_string());
        args.extend(step.command.iter().cloned());

        args
    }
}

impl SandboxBackend for DockerBackend {
    fn execute(&self, step: &ExecStep) -> Result<Execution> {
        if step.command.is_empty() {
            bail!("Empty command");
        }

        let container_name = self.next_container_name();
        let args = self.docker_run_args(step, &container_name);

        let start_time = Instant::now();
        let outcome = tokio::runtime::Handle::current().block_on(async {
            let mut cmd = tokio::process::Command::new("docker");
            cmd.args(&args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = cmd.spawn()?;

            // The stdin write happens inside the timed future so a container
            // that never reads its input cannot stall past the limit
            let timed = timeout(step.time_limit + STARTUP_GRACE, async {
                feed_stdin(&mut child, step.stdin).await?;
                child.wait_with_output().await
            })
            .await;

            match timed {
                Ok(output) => anyhow::Ok(Some(output?)),
                Err(_) => {
                    remove_container(&container_name).await;
                    anyhow::Ok(None)
                }
            }
        })?;
        let elapsed = start_time.elapsed();

        let execution = match outcome {
            Some(output) => {
                let exit_code = output.status.code();
                Execution {
                    exit_code,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    elapsed,
                    timed_out: exit_code == Some(KILLED_EXIT_CODE),
                    memory_kb: 0, // Peak memory is not sampled, only capped
                }
            }
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
        true
    }
}

/// Force-removes a container that outlived its time limit
async fn remove_container(container_name: &str) {
    let removed = tokio::process::Command::new("docker")
        .args(["rm", "-f", container_name])
        .output()
        .await;

    match removed {
        Ok(output) if output.status.success() => {
            log::debug!("Removed timed-out container {container_name}");
        }
        _ => {
            log::error!("Failed to remove timed-out container {container_name}");
        }
    }
}
