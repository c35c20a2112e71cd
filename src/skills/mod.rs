pub mod builtin;
pub mod registry;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Runtime context passed to skill execution.
///
/// Relative paths given by the model are resolved against `working_dir`.
#[derive(Debug, Clone)]
pub struct SkillContext {
    pub working_dir: PathBuf,
}

impl SkillContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    /// Resolves a model-supplied path against the working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}

/// A skill that the LLM can invoke via tool_use.
///
/// The dispatch layer calls `execute()` when the model requests a
/// tool call, and sends the returned text back as the tool result.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Unique identifier used in the `tools[]` array.
    /// Must be lowercase alphanumeric + underscores (e.g. "run_python").
    fn name(&self) -> &str;

    /// Human-readable description shown to the LLM so it knows
    /// when to invoke this skill.
    fn description(&self) -> &str;

    /// JSON Schema describing the parameters this skill accepts.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Declared capabilities, e.g. "process:python", "filesystem:write".
    fn capabilities(&self) -> Vec<String> {
        vec![]
    }

    /// Execute the skill with the given parameters and return a text result.
    ///
    /// An `Err` means the call itself was malformed (missing parameter,
    /// wrong type); failures of the requested action are reported as
    /// text in `Ok` so the model can read them.
    async fn execute(
        &self,
        params: serde_json::Value,
        context: &SkillContext,
    ) -> anyhow::Result<String>;
}

pub use registry::{SkillRegistry, ToolDefinition};
