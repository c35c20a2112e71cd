use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::process::{run_with_limits, ExecutionLimits, ExecutionOutcome};
use super::scratch::ScratchFile;
use super::validator::{Validator, Verdict};
use crate::config::SandboxConfig;

/// Runs validator-approved Python in a scrubbed child process.
///
/// Every call validates first, writes the source to its own scratch
/// file, and runs the interpreter with only `PATH` and `HOME` set. The
/// scratch file is gone by the time `run` returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct Executor {
    validator: Validator,
    interpreter: PathBuf,
    interpreter_args: Vec<String>,
    limits: ExecutionLimits,
    child_path: String,
    home_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl Executor {
    /// Builds an executor and its validator from config.
    pub fn from_config(config: &SandboxConfig) -> Result<Self> {
        let validator = Validator::new(Arc::new(config.denylist()?));
        Ok(Self::new(validator, config))
    }

    /// Builds an executor around an existing validator, so several
    /// executors can share one denylist.
    pub fn new(validator: Validator, config: &SandboxConfig) -> Self {
        let interpreter = resolve_program(&config.interpreter, &config.path);
        debug!("Python interpreter resolved to {}", interpreter.display());

        Self {
            validator,
            interpreter,
            interpreter_args: config.interpreter_args.clone(),
            limits: config.limits(),
            child_path: config.path.clone(),
            home_dir: config.home_dir.clone(),
            scratch_dir: config.scratch_dir.clone(),
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Validates and, if approved, executes `source`.
    ///
    /// Never returns an error: rejections, spawn failures and timeouts
    /// are all reported through [`ExecutionOutcome`].
    pub async fn run(&self, source: &str) -> ExecutionOutcome {
        let verdict = self.validator.check(source);
        if let Verdict::Rejected(violations) = &verdict {
            info!(
                "Code rejected by validator: {} violation(s)",
                violations.len()
            );
            return ExecutionOutcome::ExecutionError(verdict.to_string());
        }

        let scratch = match ScratchFile::create(&self.scratch_dir, "py", source) {
            Ok(scratch) => scratch,
            Err(e) => {
                warn!("Could not prepare scratch file: {e:#}");
                return ExecutionOutcome::ExecutionError(format!("Execution error: {e:#}"));
            }
        };

        let mut command = Command::new(&self.interpreter);
        command
            .args(&self.interpreter_args)
            .arg(scratch.path())
            .env_clear()
            .envs(self.sandbox_env())
            .current_dir(&self.home_dir);

        info!(
            "Executing {} bytes of Python ({})",
            source.len(),
            scratch.path().display()
        );
        let outcome = run_with_limits(command, self.limits).await;

        // Removal is the very last step, on every path
        drop(scratch);
        outcome
    }

    /// The complete environment of the child; nothing else is inherited.
    fn sandbox_env(&self) -> Vec<(&'static str, OsString)> {
        vec![
            ("PATH", OsString::from(&self.child_path)),
            ("HOME", self.home_dir.clone().into_os_string()),
        ]
    }
}

/// Resolves a bare program name against `preferred_path` first, then the
/// parent's own PATH. Names containing a separator are used as given.
fn resolve_program(program: &str, preferred_path: &str) -> PathBuf {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return PathBuf::from(program);
    }

    let inherited = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(preferred_path)
        .chain(std::env::split_paths(&inherited))
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
        .unwrap_or_else(|| PathBuf::from(program))
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
