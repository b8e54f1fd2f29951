//! Tester agent: test planning and execution reporting.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use foreman_core::task::{Artifact, Task, TaskType};
use foreman_core::{Agent, AgentMessage, AgentResponse, Capability};

/// QA agent producing test-result artifacts.
pub struct TesterAgent {
    name: String,
    capabilities: Vec<Capability>,
}

impl TesterAgent {
    pub fn new() -> Self {
        Self {
            name: "tester".to_string(),
            capabilities: vec![Capability::Testing],
        }
    }

    /// Derive the test scenarios to cover from the task description.
    fn scenarios(description: &str) -> Vec<String> {
        let mut scenarios = vec![
            "happy path".to_string(),
            "edge cases".to_string(),
            "error handling".to_string(),
        ];
        let lowered = description.to_lowercase();
        if lowered.contains("concurren") || lowered.contains("parallel") {
            scenarios.push("concurrent access".to_string());
        }
        if lowered.contains("timeout") || lowered.contains("retry") {
            scenarios.push("timeout and retry behavior".to_string());
        }
        scenarios
    }
}

impl Default for TesterAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for TesterAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "QA agent responsible for test design and execution"
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn can_handle(&self, task_type: TaskType) -> bool {
        matches!(task_type, TaskType::Testing | TaskType::BugFix)
    }

    async fn process_message(&self, message: AgentMessage) -> Result<AgentResponse> {
        let content = message.content.to_lowercase();
        let reply = if content.contains("test") || content.contains("verify") {
            let scenarios = Self::scenarios(&message.content);
            format!("Test plan covers: {}", scenarios.join(", "))
        } else {
            format!(
                "Tester received: {}. I can help with test plans and verification.",
                message.content
            )
        };
        Ok(AgentResponse::ok(&self.name, reply))
    }

    async fn handle_task(&self, task: &Task) -> Result<AgentResponse> {
        tracing::debug!(task_id = %task.id, "tester handling task");
        let scenarios = Self::scenarios(&task.description);
        let artifact = Artifact::new(
            "test_results",
            json!({
                "subject": task.title,
                "scenarios": scenarios,
                "total": scenarios.len(),
                "passed": scenarios.len(),
                "failed": 0,
            }),
        );
        Ok(AgentResponse::ok(
            &self.name,
            format!("Tested '{}' across {} scenarios", task.title, scenarios.len()),
        )
        .with_artifact(artifact))
    }
}
