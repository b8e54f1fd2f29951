//! Documentation agent.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use foreman_core::task::{Artifact, Task, TaskType};
use foreman_core::{Agent, AgentMessage, AgentResponse, Capability};

/// Documentation agent producing markdown artifacts.
pub struct DocsAgent {
    name: String,
    capabilities: Vec<Capability>,
}

impl DocsAgent {
    pub fn new() -> Self {
        Self {
            name: "docs".to_string(),
            capabilities: vec![Capability::Documentation],
        }
    }

    fn outline(task: &Task) -> String {
        format!(
            "# {}\n\n## Overview\n\n{}\n\n## Usage\n\n## Reference\n",
            task.title,
            task.description.trim()
        )
    }
}

impl Default for DocsAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for DocsAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Documentation agent responsible for guides and reference material"
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn can_handle(&self, task_type: TaskType) -> bool {
        task_type == TaskType::Documentation
    }

    async fn process_message(&self, message: AgentMessage) -> Result<AgentResponse> {
        Ok(AgentResponse::ok(
            &self.name,
            format!("Docs agent received: {}. Send a documentation task for a draft.", message.content),
        ))
    }

    async fn handle_task(&self, task: &Task) -> Result<AgentResponse> {
        tracing::debug!(task_id = %task.id, "docs agent handling task");
        let artifact = Artifact::new(
            "documentation",
            json!({
                "format": "markdown",
                "content": Self::outline(task),
            }),
        );
        Ok(AgentResponse::ok(
            &self.name,
            format!("Drafted documentation for '{}'", task.title),
        )
        .with_artifact(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::task::TaskPriority;

    #[tokio::test]
    async fn documentation_task_yields_markdown() {
        let agent = DocsAgent::new();
        let task = Task::new(
            "Queue guide",
            "How scheduling works",
            TaskType::Documentation,
            TaskPriority::Low,
        );
        let response = agent.handle_task(&task).await.unwrap();
        let artifact = &response.artifacts[0];
        assert_eq!(artifact.kind, "documentation");
        assert_eq!(artifact.data["format"], "markdown");
        let content = artifact.data["content"].as_str().unwrap();
        assert!(content.starts_with("# Queue guide"));
        assert!(content.contains("How scheduling works"));
    }
}
