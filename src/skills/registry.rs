//! Skills registry: holds the tools exposed to the model and routes
//! tool calls to them by name.
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::builtin::{
    EditFileSkill, ListFilesSkill, ReadFileSkill, RunBashSkill, RunPythonSkill,
    SearchFilesSkill, WriteFileSkill,
};
use super::{Skill, SkillContext};
use crate::sandbox::{Executor, ShellRunner};

/// Tool definition in the shape LLM tool-use APIs expect.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Default)]
pub struct SkillRegistry {
    skills: Vec<Box<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every builtin tool: the sandboxed Python runner,
    /// the shell runner and the file tools.
    pub fn with_builtins(executor: Arc<Executor>, shell: Arc<ShellRunner>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ReadFileSkill));
        registry.register(Box::new(WriteFileSkill));
        registry.register(Box::new(EditFileSkill));
        registry.register(Box::new(ListFilesSkill));
        registry.register(Box::new(SearchFilesSkill));
        registry.register(Box::new(RunPythonSkill::new(executor)));
        registry.register(Box::new(RunBashSkill::new(shell)));
        registry
    }

    /// Adds a skill. A skill with the same name replaces the old one.
    pub fn register(&mut self, skill: Box<dyn Skill>) {
        if let Some(pos) = self.skills.iter().position(|s| s.name() == skill.name()) {
            warn!("Skill '{}' registered twice, replacing", skill.name());
            self.skills[pos] = skill;
        } else {
            self.skills.push(skill);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Skill> {
        self.skills
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.name()).collect()
    }

    /// Definitions for every registered skill, in registration order.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.skills
            .iter()
            .map(|s| ToolDefinition {
                name: s.name().to_string(),
                description: s.description().to_string(),
                input_schema: s.parameters_schema(),
            })
            .collect()
    }

    /// Routes one tool call. Always produces text for the model: an
    /// unknown tool or a malformed call becomes an error message.
    pub async fn dispatch(&self, name: &str, params: Value, context: &SkillContext) -> String {
        let Some(skill) = self.get(name) else {
            warn!("Model requested unknown tool: {name}");
            return format!("Error: Unknown tool: {name}");
        };

        debug!("Dispatching tool call: {name}");
        match skill.execute(params, context).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool {name} failed: {e}");
                format!("Error executing {name}: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SandboxConfig, ShellConfig};
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoSkill {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl Skill for EchoSkill {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Echo a fixed reply"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, params: Value, _context: &SkillContext) -> anyhow::Result<String> {
            if params.get("fail").is_some() {
                anyhow::bail!("Missing required parameter: text");
            }
            Ok(self.reply.to_string())
        }
    }

    fn builtins() -> SkillRegistry {
        let executor = Executor::from_config(&SandboxConfig::default()).unwrap();
        let shell = ShellRunner::new(&ShellConfig::default());
        SkillRegistry::with_builtins(Arc::new(executor), Arc::new(shell))
    }

    #[test]
    fn test_new_is_empty() {
        let registry = SkillRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.tool_definitions().is_empty());
    }

    #[test]
    fn test_builtins_registered_in_order() {
        let registry = builtins();
        assert_eq!(
            registry.names(),
            vec![
                "read_file",
                "write_file",
                "edit_file",
                "list_files",
                "search_files",
                "run_python",
                "run_bash",
            ]
        );
    }

    #[test]
    fn test_tool_definitions_shape() {
        let registry = builtins();
        for def in registry.tool_definitions() {
            assert!(!def.description.is_empty(), "{} has no description", def.name);
            assert_eq!(def.input_schema["type"], "object", "{} schema", def.name);
        }
        let serialized = serde_json::to_value(registry.tool_definitions()).unwrap();
        assert_eq!(serialized[5]["name"], "run_python");
        assert!(serialized[5]["input_schema"]["properties"]["code"].is_object());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = SkillRegistry::new();
        registry.register(Box::new(EchoSkill { name: "echo", reply: "one" }));
        registry.register(Box::new(EchoSkill { name: "echo", reply: "two" }));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_known_tool() {
        let mut registry = SkillRegistry::new();
        registry.register(Box::new(EchoSkill { name: "echo", reply: "pong" }));
        let ctx = SkillContext::new("/tmp");
        assert_eq!(registry.dispatch("echo", json!({}), &ctx).await, "pong");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let registry = SkillRegistry::new();
        let ctx = SkillContext::new("/tmp");
        assert_eq!(
            registry.dispatch("launch_rockets", json!({}), &ctx).await,
            "Error: Unknown tool: launch_rockets"
        );
    }

    #[tokio::test]
    async fn test_dispatch_skill_error_becomes_text() {
        let mut registry = SkillRegistry::new();
        registry.register(Box::new(EchoSkill { name: "echo", reply: "pong" }));
        let ctx = SkillContext::new("/tmp");
        let result = registry.dispatch("echo", json!({"fail": true}), &ctx).await;
        assert_eq!(
            result,
            "Error executing echo: Missing required parameter: text"
        );
    }

    #[tokio::test]
    async fn test_dispatch_run_python_rejection() {
        let registry = builtins();
        let ctx = SkillContext::new("/tmp");
        let result = registry
            .dispatch("run_python", json!({"code": "import os"}), &ctx)
            .await;
        assert!(result.starts_with("Execution failed:\nCode validation failed:"));
    }
}
