//! Security agent: audits outputs and flags risk indicators.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use foreman_core::task::{Artifact, Task, TaskType};
use foreman_core::{Agent, AgentMessage, AgentResponse, Capability};

/// Substrings in a task description that raise a finding during review.
const RISK_MARKERS: &[(&str, &str)] = &[
    ("password", "credential handling in scope"),
    ("secret", "secret material in scope"),
    ("token", "token handling in scope"),
    ("sql", "potential injection surface"),
    ("deserial", "untrusted deserialization surface"),
    ("unsafe", "unsafe code in scope"),
];

/// Security analysis agent producing finding artifacts.
pub struct SecurityAgent {
    name: String,
    capabilities: Vec<Capability>,
}

impl SecurityAgent {
    pub fn new() -> Self {
        Self {
            name: "security".to_string(),
            capabilities: vec![Capability::SecurityAnalysis],
        }
    }

    fn findings(description: &str) -> Vec<String> {
        let lowered = description.to_lowercase();
        RISK_MARKERS
            .iter()
            .filter(|(marker, _)| lowered.contains(marker))
            .map(|(_, finding)| (*finding).to_string())
            .collect()
    }
}

impl Default for SecurityAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for SecurityAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Security agent responsible for audits and risk analysis"
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn can_handle(&self, task_type: TaskType) -> bool {
        task_type == TaskType::SecurityReview
    }

    async fn process_message(&self, message: AgentMessage) -> Result<AgentResponse> {
        let findings = Self::findings(&message.content);
        let reply = if findings.is_empty() {
            format!("No risk markers in: {}", message.content)
        } else {
            format!("Flagged: {}", findings.join("; "))
        };
        Ok(AgentResponse::ok(&self.name, reply))
    }

    async fn handle_task(&self, task: &Task) -> Result<AgentResponse> {
        tracing::debug!(task_id = %task.id, "security agent handling task");
        let findings = Self::findings(&task.description);
        let risk_level = match findings.len() {
            0 => "low",
            1 => "medium",
            _ => "high",
        };
        let artifact = Artifact::new(
            "security_findings",
            json!({
                "subject": task.title,
                "findings": findings,
                "risk_level": risk_level,
            }),
        );
        Ok(AgentResponse::ok(
            &self.name,
            format!("Audited '{}': risk level {risk_level}", task.title),
        )
        .with_artifact(artifact))
    }
}
