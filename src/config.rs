use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sandbox::denylist::{
    Denylist, DEFAULT_BLOCKED_ATTRIBUTES, DEFAULT_BLOCKED_CALLABLES, DEFAULT_BLOCKED_MODULES,
};
use crate::sandbox::ExecutionLimits;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub shell: ShellConfig,
}

/// Settings for validated Python execution.
#[derive(Debug, Deserialize, Clone)]
pub struct SandboxConfig {
    /// Interpreter name or path, resolved against `path` then the parent PATH
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Extra interpreter flags placed before the script path
    #[serde(default = "default_interpreter_args")]
    pub interpreter_args: Vec<String>,
    #[serde(default = "default_code_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// The only PATH the child sees
    #[serde(default = "default_child_path")]
    pub path: String,
    /// HOME and working directory of the child
    #[serde(default = "default_scratch_dir")]
    pub home_dir: PathBuf,
    /// Where per-call scratch files are created
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default)]
    pub denylist: DenylistConfig,
}

/// Optional overrides; an omitted list keeps the built-in default.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DenylistConfig {
    pub modules: Option<Vec<String>>,
    pub callables: Option<Vec<String>>,
    pub attributes: Option<Vec<String>>,
}

/// Settings for the unrestricted shell runner.
#[derive(Debug, Deserialize, Clone)]
pub struct ShellConfig {
    #[serde(default = "default_shell_program")]
    pub program: String,
    #[serde(default = "default_shell_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Defaults to the agent's own working directory
    pub working_dir: Option<PathBuf>,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_interpreter_args() -> Vec<String> {
    // Isolated mode: no user site-packages, no PYTHON* variables,
    // script directory not prepended to sys.path
    vec!["-I".to_string()]
}

fn default_code_timeout_secs() -> u64 {
    10
}

fn default_shell_timeout_secs() -> u64 {
    60
}

fn default_max_output_bytes() -> usize {
    10_000
}

fn default_child_path() -> String {
    "/usr/local/bin:/usr/bin:/bin".to_string()
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_shell_program() -> String {
    "bash".to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: default_interpreter_args(),
            timeout_secs: default_code_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            path: default_child_path(),
            home_dir: default_scratch_dir(),
            scratch_dir: default_scratch_dir(),
            denylist: DenylistConfig::default(),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_shell_program(),
            timeout_secs: default_shell_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            working_dir: None,
        }
    }
}

impl SandboxConfig {
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            timeout: Duration::from_secs(self.timeout_secs),
            max_output_bytes: self.max_output_bytes,
        }
    }

    /// Builds the process-wide denylist, falling back to the defaults
    /// for every list the config leaves out.
    pub fn denylist(&self) -> Result<Denylist> {
        fn or_default(list: &Option<Vec<String>>, default: &[&str]) -> Vec<String> {
            match list {
                Some(names) => names.clone(),
                None => default.iter().map(|s| s.to_string()).collect(),
            }
        }

        Denylist::new(
            or_default(&self.denylist.modules, DEFAULT_BLOCKED_MODULES),
            or_default(&self.denylist.callables, DEFAULT_BLOCKED_CALLABLES),
            or_default(&self.denylist.attributes, DEFAULT_BLOCKED_ATTRIBUTES),
        )
    }
}

impl ShellConfig {
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            timeout: Duration::from_secs(self.timeout_secs),
            max_output_bytes: self.max_output_bytes,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        Self::parse(&content).with_context(|| format!("loading config file {path}"))
    }

    /// Loads `path` if it exists; a missing file yields the defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        // Expand environment variables like ${SANDBOX_SCRATCH}
        let expanded = shellexpand::env(content)?;
        let config: Config = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sandbox.timeout_secs == 0 {
            bail!("sandbox.timeout_secs must be greater than zero");
        }
        if self.sandbox.max_output_bytes == 0 {
            bail!("sandbox.max_output_bytes must be greater than zero");
        }
        if self.shell.timeout_secs == 0 {
            bail!("shell.timeout_secs must be greater than zero");
        }
        if self.shell.max_output_bytes == 0 {
            bail!("shell.max_output_bytes must be greater than zero");
        }
        if self.sandbox.interpreter.trim().is_empty() {
            bail!("sandbox.interpreter must not be empty");
        }
        self.sandbox.denylist()?;
        Ok(())
    }
}
