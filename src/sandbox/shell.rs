use std::path::PathBuf;

use tokio::process::Command;
use tracing::info;

use super::process::{run_with_limits, ExecutionLimits, ExecutionOutcome};
use crate::config::ShellConfig;

/// Runs shell commands with the executor's timeout and output policy.
///
/// Unlike [`super::Executor`] there is no validation and no environment
/// scrubbing: commands run as the agent itself would run them.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    program: String,
    limits: ExecutionLimits,
    working_dir: Option<PathBuf>,
}

impl ShellRunner {
    pub fn new(config: &ShellConfig) -> Self {
        Self {
            program: config.program.clone(),
            limits: config.limits(),
            working_dir: config.working_dir.clone(),
        }
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Runs `<program> -c <command>` and returns its bounded outcome.
    pub async fn run(&self, command: &str) -> ExecutionOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-c").arg(command);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        info!("Running shell command via {}: {command}", self.program);
        run_with_limits(cmd, self.limits).await
    }
}
