//! Reviewer agent: code review with correction signaling.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use foreman_core::task::{Artifact, Task, TaskType};
use foreman_core::{Agent, AgentMessage, AgentResponse, Capability};

/// Markers in a task description that a review must flag for correction.
const BLOCKING_MARKERS: &[&str] = &["todo", "fixme", "hack", "unimplemented"];

/// Review agent.
///
/// Approves clean work and requests correction when the reviewed material
/// carries unfinished-work markers, feeding the orchestrator's correction
/// loop.
pub struct ReviewerAgent {
    name: String,
    capabilities: Vec<Capability>,
}

impl ReviewerAgent {
    pub fn new() -> Self {
        Self {
            name: "reviewer".to_string(),
            capabilities: vec![Capability::CodeReview, Capability::Evaluation],
        }
    }

    fn blockers(text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        BLOCKING_MARKERS
            .iter()
            .filter(|marker| lowered.contains(*marker))
            .map(|marker| format!("unfinished-work marker present: {marker}"))
            .collect()
    }
}

impl Default for ReviewerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ReviewerAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Review agent responsible for code review and output evaluation"
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn can_handle(&self, task_type: TaskType) -> bool {
        task_type == TaskType::CodeReview
    }

    async fn process_message(&self, message: AgentMessage) -> Result<AgentResponse> {
        let blockers = Self::blockers(&message.content);
        let reply = if blockers.is_empty() {
            format!("Review of '{}': no blockers found.", message.content)
        } else {
            format!("Review blocked: {}", blockers.join("; "))
        };
        Ok(AgentResponse::ok(&self.name, reply))
    }

    async fn handle_task(&self, task: &Task) -> Result<AgentResponse> {
        tracing::debug!(task_id = %task.id, "reviewer handling task");
        let blockers = Self::blockers(&task.description);
        let approved = blockers.is_empty();

        let artifact = Artifact::new(
            "review",
            json!({
                "subject": task.title,
                "approved": approved,
                "comments": blockers,
            }),
        );

        let mut response = AgentResponse::ok(
            &self.name,
            if approved {
                format!("Approved: {}", task.title)
            } else {
                format!("Changes requested on: {}", task.title)
            },
        )
        .with_artifact(artifact);

        if !approved {
            response.needs_correction = true;
            response.correction_reason = Some(blockers.join("; "));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::task::TaskPriority;

    #[tokio::test]
    async fn clean_work_is_approved() {
        let agent = ReviewerAgent::new();
        let task = Task::new(
            "Review queue changes",
            "Scheduling fix with tests",
            TaskType::CodeReview,
            TaskPriority::Medium,
        );
        let response = agent.handle_task(&task).await.unwrap();
        assert!(response.success);
        assert!(!response.needs_correction);
        assert_eq!(response.artifacts[0].data["approved"], true);
    }

    #[tokio::test]
    async fn unfinished_markers_request_correction() {
        let agent = ReviewerAgent::new();
        let task = Task::new(
            "Review draft",
            "Contains a TODO in the error path",
            TaskType::CodeReview,
            TaskPriority::Medium,
        );
        let response = agent.handle_task(&task).await.unwrap();
        assert!(response.needs_correction);
        assert!(response.correction_reason.as_deref().unwrap().contains("todo"));
        assert_eq!(response.artifacts[0].data["approved"], false);
    }
}
