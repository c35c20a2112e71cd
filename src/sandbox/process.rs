//! Child process driver shared by the executor and the shell runner.
//!
//! One deadline covers both the child's exit and the draining of its
//! pipes. On expiry the whole process group is killed and reaped, and
//! whatever was captured is thrown away.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::output::{combine_output, read_bounded};

/// Bounds applied to one child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// The single result of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The child exited on its own. A non-zero `exit_code` is a property
    /// of the program, not a failure of the sandbox.
    Completed { exit_code: i32, output: String },
    /// The deadline passed; the child was killed and its output dropped.
    TimedOut { after: Duration },
    /// Nothing ran, or the child could not be started.
    ExecutionError(String),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { exit_code: 0, .. })
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Completed { exit_code, output } => {
                write!(f, "exit code {exit_code}")?;
                if !output.is_empty() {
                    write!(f, ":\n{output}")?;
                }
                Ok(())
            }
            ExecutionOutcome::TimedOut { after } => {
                write!(f, "timed out after {} seconds", after.as_secs())
            }
            ExecutionOutcome::ExecutionError(message) => f.write_str(message),
        }
    }
}

/// Spawns `command` and waits for it under `limits`.
///
/// Stdout and stderr are piped, stdin is closed, and on Unix the child
/// leads its own process group so a timeout can kill any grandchildren
/// too. `kill_on_drop` covers the caller dropping this future early.
pub async fn run_with_limits(mut command: Command, limits: ExecutionLimits) -> ExecutionOutcome {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to spawn {program}: {e}");
            return ExecutionOutcome::ExecutionError(format!("Failed to start {program}: {e}"));
        }
    };
    let pid = child.id();
    debug!("Spawned {program} (pid {pid:?})");

    // Keep one byte past the cap so truncation is still detectable
    let keep = limits.max_output_bytes.saturating_add(1);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let collected = tokio::time::timeout(limits.timeout, async {
        let (status, stdout, stderr) = tokio::join!(
            child.wait(),
            read_bounded(stdout, keep),
            read_bounded(stderr, keep),
        );
        Ok::<_, std::io::Error>((status?, stdout?, stderr?))
    })
    .await;

    match collected {
        Ok(Ok((status, stdout, stderr))) => {
            let exit_code = status.code().unwrap_or(-1);
            let (output, truncated) = combine_output(&stdout, &stderr, limits.max_output_bytes);
            if truncated {
                info!(
                    "Output of {program} truncated to {} bytes",
                    limits.max_output_bytes
                );
            }
            debug!("{program} exited with code {exit_code}");
            ExecutionOutcome::Completed { exit_code, output }
        }
        Ok(Err(e)) => {
            warn!("I/O error while waiting for {program}: {e}");
            terminate(&mut child, pid).await;
            ExecutionOutcome::ExecutionError(format!("I/O error while running {program}: {e}"))
        }
        Err(_elapsed) => {
            info!(
                "{program} exceeded {}s timeout, killing",
                limits.timeout.as_secs_f64()
            );
            terminate(&mut child, pid).await;
            ExecutionOutcome::TimedOut {
                after: limits.timeout,
            }
        }
    }
}

/// Kills the child's process group (Unix) or the child itself, then
/// reaps it so no zombie is left behind.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // Spawned with process_group(0), so the pid is also the pgid.
            // SAFETY: killpg has no memory-safety preconditions.
            let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
            if rc == -1 {
                debug!(
                    "killpg({pid}) failed: {}",
                    std::io::Error::last_os_error()
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        debug!("Child already gone after kill: {e}");
    }
}
