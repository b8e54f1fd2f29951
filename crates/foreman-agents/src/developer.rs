//! Developer agent: code generation, bug fixing, and refactoring.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use foreman_core::task::{Artifact, Task, TaskType};
use foreman_core::{Agent, AgentMessage, AgentResponse, Capability};

/// Developer agent.
///
/// Produces code artifacts for development, feature, and bug-fix tasks and
/// participates in code review.
pub struct DeveloperAgent {
    name: String,
    capabilities: Vec<Capability>,
}

impl DeveloperAgent {
    pub fn new() -> Self {
        Self {
            name: "developer".to_string(),
            capabilities: vec![Capability::Coding, Capability::CodeReview],
        }
    }

    fn module_name(title: &str) -> String {
        let slug: String = title
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}.rs", slug.trim_matches('_'))
    }

    fn code_artifact(&self, task: &Task) -> Artifact {
        Artifact::new(
            "code",
            json!({
                "filename": Self::module_name(&task.title),
                "language": "rust",
                "content": format!("// Implementation for: {}\n// Derived from: {}", task.title, task.description.lines().next().unwrap_or("")),
            }),
        )
    }
}

impl Default for DeveloperAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for DeveloperAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Developer agent responsible for implementation, bug fixing, and code review"
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn can_handle(&self, task_type: TaskType) -> bool {
        matches!(
            task_type,
            TaskType::Development | TaskType::BugFix | TaskType::CodeReview | TaskType::Feature
        )
    }

    async fn process_message(&self, message: AgentMessage) -> Result<AgentResponse> {
        let content = message.content.to_lowercase();
        let reply = if content.contains("implement") || content.contains("write") {
            format!("Drafting an implementation for: {}", message.content)
        } else if content.contains("review") {
            format!("Reviewing: {}. Focus: correctness, clarity, error paths.", message.content)
        } else if content.contains("fix") || content.contains("bug") {
            format!("Investigating the defect described in: {}", message.content)
        } else if content.contains("refactor") {
            format!("Refactoring proposal for: {}", message.content)
        } else {
            format!(
                "Developer received: {}. I can help with implementation, review, fixes, and refactoring.",
                message.content
            )
        };
        Ok(AgentResponse::ok(&self.name, reply))
    }

    async fn handle_task(&self, task: &Task) -> Result<AgentResponse> {
        tracing::debug!(task_id = %task.id, task_type = %task.task_type, "developer handling task");
        let response = match task.task_type {
            TaskType::Development | TaskType::Feature => AgentResponse::ok(
                &self.name,
                format!("Implemented: {}", task.title),
            )
            .with_artifact(self.code_artifact(task)),
            TaskType::BugFix => AgentResponse::ok(
                &self.name,
                format!("Fixed: {}", task.title),
            )
            .with_artifact(self.code_artifact(task))
            .with_artifact(Artifact::new(
                "regression_test",
                json!({ "covers": task.title }),
            )),
            TaskType::CodeReview => AgentResponse::ok(
                &self.name,
                format!("Reviewed: {}", task.title),
            ),
            other => AgentResponse::ok(
                &self.name,
                format!("Processed {} task: {}", other, task.title),
            ),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::task::TaskPriority;

    #[tokio::test]
    async fn development_task_produces_a_code_artifact() {
        let agent = DeveloperAgent::new();
        let task = Task::new(
            "Add retry backoff",
            "Implement exponential backoff",
            TaskType::Development,
            TaskPriority::High,
        );

        let response = agent.handle_task(&task).await.unwrap();
        assert!(response.success);
        assert_eq!(response.artifacts.len(), 1);
        assert_eq!(response.artifacts[0].kind, "code");
        assert_eq!(response.artifacts[0].data["filename"], "add_retry_backoff.rs");
        assert_eq!(response.artifacts[0].data["language"], "rust");
    }

    #[tokio::test]
    async fn bug_fix_also_emits_a_regression_test() {
        let agent = DeveloperAgent::new();
        let task = Task::new(
            "Crash on empty input",
            "Index panic in the parser",
            TaskType::BugFix,
            TaskPriority::Critical,
        );

        let response = agent.handle_task(&task).await.unwrap();
        let kinds: Vec<&str> = response.artifacts.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["code", "regression_test"]);
    }

    #[test]
    fn refuses_unrelated_task_types() {
        let agent = DeveloperAgent::new();
        assert!(!agent.can_handle(TaskType::Documentation));
        assert!(!agent.can_handle(TaskType::SecurityReview));
    }
}
