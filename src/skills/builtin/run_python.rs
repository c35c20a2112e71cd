//! Builtin skill: run model-written Python through the sandbox.
//!
//! The source goes through the validator and the isolated executor;
//! the outcome is rendered as text for the tool result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::sandbox::{ExecutionOutcome, Executor};
use crate::skills::{Skill, SkillContext};

pub struct RunPythonSkill {
    executor: Arc<Executor>,
    description: String,
}

impl RunPythonSkill {
    pub fn new(executor: Arc<Executor>) -> Self {
        let description = format!(
            "Execute Python code in a sandboxed environment.\n\n\
             Use this to test code, run calculations, or verify implementations.\n\n\
             Restrictions:\n\
             - No file I/O (use read_file/write_file instead)\n\
             - No network access\n\
             - No dangerous imports\n\
             - {} second timeout",
            executor.limits().timeout.as_secs()
        );
        Self {
            executor,
            description,
        }
    }
}

/// Renders an outcome the way the model sees it.
fn render(outcome: &ExecutionOutcome) -> String {
    match outcome {
        ExecutionOutcome::Completed {
            exit_code: 0,
            output,
        } => {
            let output = if output.is_empty() {
                "(no output)"
            } else {
                output.as_str()
            };
            format!("Execution successful:\n{output}")
        }
        ExecutionOutcome::Completed { exit_code, output } => {
            format!("Execution failed:\nExit code {exit_code}:\n{output}")
        }
        ExecutionOutcome::TimedOut { after } => format!(
            "Execution failed:\nExecution timed out after {} seconds",
            after.as_secs()
        ),
        ExecutionOutcome::ExecutionError(message) => format!("Execution failed:\n{message}"),
    }
}

#[async_trait]
impl Skill for RunPythonSkill {
    fn name(&self) -> &str {
        "run_python"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python code to execute"
                }
            },
            "required": ["code"]
        })
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["process:python:sandboxed".to_string()]
    }

    async fn execute(&self, params: Value, _context: &SkillContext) -> anyhow::Result<String> {
        let code = params["code"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: code"))?;

        let outcome = self.executor.run(code).await;
        Ok(render(&outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use std::time::Duration;

    fn skill(scratch: &std::path::Path) -> RunPythonSkill {
        let config = SandboxConfig {
            home_dir: scratch.to_path_buf(),
            scratch_dir: scratch.to_path_buf(),
            ..SandboxConfig::default()
        };
        RunPythonSkill::new(Arc::new(Executor::from_config(&config).unwrap()))
    }

    fn test_context() -> SkillContext {
        SkillContext::new("/tmp")
    }

    // ── Trait method tests ──────────────────────────────

    #[test]
    fn test_name_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let skill = skill(dir.path());
        assert_eq!(skill.name(), "run_python");
        let schema = skill.parameters_schema();
        assert_eq!(schema["properties"]["code"]["type"], "string");
        assert!(schema["required"].as_array().unwrap().contains(&json!("code")));
    }

    #[test]
    fn test_description_mentions_timeout() {
        let dir = tempfile::tempdir().unwrap();
        assert!(skill(dir.path()).description().contains("10 second timeout"));
    }

    // ── render tests ────────────────────────────────────

    #[test]
    fn test_render_success() {
        let outcome = ExecutionOutcome::Completed {
            exit_code: 0,
            output: "45\n".to_string(),
        };
        assert_eq!(render(&outcome), "Execution successful:\n45\n");
    }

    #[test]
    fn test_render_success_without_output() {
        let outcome = ExecutionOutcome::Completed {
            exit_code: 0,
            output: String::new(),
        };
        assert_eq!(render(&outcome), "Execution successful:\n(no output)");
    }

    #[test]
    fn test_render_nonzero_exit() {
        let outcome = ExecutionOutcome::Completed {
            exit_code: 1,
            output: "Traceback".to_string(),
        };
        assert_eq!(render(&outcome), "Execution failed:\nExit code 1:\nTraceback");
    }

    #[test]
    fn test_render_timeout() {
        let outcome = ExecutionOutcome::TimedOut {
            after: Duration::from_secs(10),
        };
        assert_eq!(
            render(&outcome),
            "Execution failed:\nExecution timed out after 10 seconds"
        );
    }

    // ── Execution tests ─────────────────────────────────

    #[tokio::test]
    async fn test_execute_missing_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = skill(dir.path()).execute(json!({}), &test_context()).await;
        assert!(result.unwrap_err().to_string().contains("code"));
    }

    #[tokio::test]
    async fn test_execute_runs_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = skill(dir.path())
            .execute(json!({"code": "print(sum(range(10)))"}), &test_context())
            .await
            .unwrap();
        assert_eq!(result, "Execution successful:\n45\n");
    }

    #[tokio::test]
    async fn test_execute_blocked_call() {
        let dir = tempfile::tempdir().unwrap();
        let result = skill(dir.path())
            .execute(
                json!({"code": "result = eval('1+1'); print(result)"}),
                &test_context(),
            )
            .await
            .unwrap();
        assert!(result.starts_with("Execution failed:\nCode validation failed:"));
        assert!(result.contains("Blocked function: 'eval()' (line 1)"));
    }
}
