//! Planner agent: decomposes goals into ordered subtask descriptions.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use foreman_core::task::{Artifact, Task, TaskType};
use foreman_core::{Agent, AgentMessage, AgentResponse, Capability};

/// Planning agent.
///
/// Responsible for breaking work down into steps, estimating order, and
/// producing plan artifacts that downstream agents consume.
pub struct PlannerAgent {
    name: String,
    capabilities: Vec<Capability>,
}

impl PlannerAgent {
    pub fn new() -> Self {
        Self {
            name: "planner".to_string(),
            capabilities: vec![Capability::Planning, Capability::TaskDecomposition],
        }
    }

    /// Derive subtask descriptions from a goal description.
    ///
    /// Each non-empty line of the description becomes a step; a one-line
    /// description is expanded into the standard design/implement/verify
    /// sequence.
    fn decompose(&self, description: &str) -> Vec<String> {
        let lines: Vec<String> = description
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.trim_start_matches(['-', '*', ' ']).to_string())
            .collect();

        if lines.len() > 1 {
            lines
        } else {
            let goal = lines.first().cloned().unwrap_or_else(|| "the goal".to_string());
            vec![
                format!("Design an approach for: {goal}"),
                format!("Implement: {goal}"),
                format!("Verify the result of: {goal}"),
            ]
        }
    }
}

impl Default for PlannerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Planning agent responsible for task decomposition and ordering"
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn can_handle(&self, task_type: TaskType) -> bool {
        matches!(
            task_type,
            TaskType::Planning | TaskType::Feature
        )
    }

    async fn process_message(&self, message: AgentMessage) -> Result<AgentResponse> {
        let content = message.content.to_lowercase();
        let reply = if content.contains("plan") || content.contains("decompose") {
            let steps = self.decompose(&message.content);
            format!("Proposed plan with {} steps:\n{}", steps.len(), steps.join("\n"))
        } else if content.contains("estimate") {
            "Estimation requires a decomposed plan; send the goal to plan first.".to_string()
        } else {
            format!(
                "Planner received: {}. I can help with planning, decomposition, and ordering.",
                message.content
            )
        };
        Ok(AgentResponse::ok(&self.name, reply))
    }

    async fn handle_task(&self, task: &Task) -> Result<AgentResponse> {
        tracing::debug!(task_id = %task.id, "planner handling task");
        let subtasks = self.decompose(&task.description);
        let artifact = Artifact::new(
            "plan",
            json!({
                "goal": task.title,
                "subtasks": subtasks,
                "ordered": true,
            }),
        );
        let response = AgentResponse::ok(
            &self.name,
            format!("Planned '{}' as {} subtasks", task.title, subtasks.len()),
        )
        .with_artifact(artifact);
        Ok(response)
    }
}
