//! Builtin skill: run a shell command with a timeout and output cap.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::sandbox::{ExecutionOutcome, ShellRunner};
use crate::skills::{Skill, SkillContext};

pub struct RunBashSkill {
    shell: Arc<ShellRunner>,
    description: String,
}

impl RunBashSkill {
    pub fn new(shell: Arc<ShellRunner>) -> Self {
        let description = format!(
            "Execute a bash command and return the output.\n\n\
             Use this to:\n\
             - Run shell commands (ls, cat, grep, etc.)\n\
             - Execute build tools (npm, pip, make, etc.)\n\
             - Run tests (pytest, npm test, etc.)\n\
             - Git operations (git status, git diff, etc.)\n\n\
             The command runs with a {} second timeout.",
            shell.limits().timeout.as_secs()
        );
        Self { shell, description }
    }
}

fn render(outcome: &ExecutionOutcome) -> String {
    match outcome {
        ExecutionOutcome::Completed {
            exit_code: 0,
            output,
        } => {
            if output.is_empty() {
                "(command completed with no output)".to_string()
            } else {
                output.clone()
            }
        }
        ExecutionOutcome::Completed { exit_code, output } => {
            format!("Command failed (exit code {exit_code}):\n{output}")
        }
        ExecutionOutcome::TimedOut { after } => format!(
            "Error: Command timed out after {} seconds",
            after.as_secs()
        ),
        ExecutionOutcome::ExecutionError(message) => {
            format!("Error executing command: {message}")
        }
    }
}

#[async_trait]
impl Skill for RunBashSkill {
    fn name(&self) -> &str {
        "run_bash"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                }
            },
            "required": ["command"]
        })
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["process:shell:unrestricted".to_string()]
    }

    async fn execute(&self, params: Value, _context: &SkillContext) -> anyhow::Result<String> {
        let command = params["command"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: command"))?;

        let outcome = self.shell.run(command).await;
        Ok(render(&outcome))
    }
}
