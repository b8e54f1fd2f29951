//! The [`Agent`] trait -- the contract every orchestrated agent implements.
//!
//! Agents advertise a capability set, answer a synchronous routing predicate
//! ([`Agent::can_handle`]), and expose two async entry points: task handling
//! and message processing. The trait is intentionally object-safe so agents
//! can be stored as `Arc<dyn Agent>` in the [`AgentRegistry`].
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//!     |
//!     v
//! AgentRegistry --agents_for_task(task)--> [Arc<dyn Agent>]
//!     |                                         |
//!     |   handle_task(task) --------------------+
//!     |        |
//!     |        v
//!     |   AgentResponse { content, artifacts, needs_correction, ... }
//!     |   process_message(message)
//! ```

pub mod dispatch;
pub mod registry;

pub use dispatch::required_capabilities;
pub use registry::AgentRegistry;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::task::{Artifact, Task, TaskType};

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Capabilities an agent can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Planning,
    Coding,
    Testing,
    SecurityAnalysis,
    Documentation,
    CodeReview,
    TaskDecomposition,
    Evaluation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::Coding => "coding",
            Self::Testing => "testing",
            Self::SecurityAnalysis => "security_analysis",
            Self::Documentation => "documentation",
            Self::CodeReview => "code_review",
            Self::TaskDecomposition => "task_decomposition",
            Self::Evaluation => "evaluation",
        };
        f.write_str(s)
    }
}

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "coding" => Ok(Self::Coding),
            "testing" => Ok(Self::Testing),
            "security_analysis" => Ok(Self::SecurityAnalysis),
            "documentation" => Ok(Self::Documentation),
            "code_review" => Ok(Self::CodeReview),
            "task_decomposition" => Ok(Self::TaskDecomposition),
            "evaluation" => Ok(Self::Evaluation),
            other => Err(CapabilityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Capability`] string.
#[derive(Debug, Clone)]
pub struct CapabilityParseError(pub String);

impl fmt::Display for CapabilityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid capability: {:?}", self.0)
    }
}

impl std::error::Error for CapabilityParseError {}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A message sent between agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub sender: String,
    pub recipient: String,
    pub content: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
}

fn default_message_type() -> String {
    "text".to_string()
}

impl AgentMessage {
    /// Create a plain text message.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            content: content.into(),
            message_type: default_message_type(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }
}

/// A response produced by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_name: String,
    pub content: String,
    pub success: bool,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub needs_correction: bool,
    #[serde(default)]
    pub correction_reason: Option<String>,
}

impl AgentResponse {
    /// A successful response with the given content.
    pub fn ok(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            content: content.into(),
            success: true,
            artifacts: Vec::new(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
            needs_correction: false,
            correction_reason: None,
        }
    }

    /// A failed response with the given error content.
    pub fn failure(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(agent_name, content)
        }
    }

    /// Attach an artifact, consuming and returning the response.
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Contract for all orchestrated agents.
///
/// # Object Safety
///
/// This trait is object-safe: it is stored as `Arc<dyn Agent>` in the
/// [`AgentRegistry`] and the workflow engine.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique agent name used for registration and routing.
    fn name(&self) -> &str;

    /// Human-readable description of the agent's purpose.
    fn description(&self) -> &str;

    /// The capability set this agent advertises.
    fn capabilities(&self) -> &[Capability];

    /// Synchronous routing predicate: can this agent handle the task type?
    fn can_handle(&self, task_type: TaskType) -> bool;

    /// Process an incoming message and return a response.
    async fn process_message(&self, message: AgentMessage) -> Result<AgentResponse>;

    /// Handle an assigned task.
    async fn handle_task(&self, task: &Task) -> Result<AgentResponse>;

    /// Lifecycle hook, run once when the agent is registered.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Lifecycle hook, run once when the agent is unregistered.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

// Compile-time assertion: Agent must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Agent) {}
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPriority;

    /// A trivial agent used only to prove the trait can be implemented and
    /// used as `dyn Agent`.
    struct NoopAgent;

    #[async_trait]
    impl Agent for NoopAgent {
        fn name(&self) -> &str {
            "noop"
        }

        fn description(&self) -> &str {
            "does nothing"
        }

        fn capabilities(&self) -> &[Capability] {
            &[Capability::Coding]
        }

        fn can_handle(&self, task_type: TaskType) -> bool {
            task_type == TaskType::Development
        }

        async fn process_message(&self, message: AgentMessage) -> Result<AgentResponse> {
            Ok(AgentResponse::ok("noop", format!("echo: {}", message.content)))
        }

        async fn handle_task(&self, task: &Task) -> Result<AgentResponse> {
            Ok(AgentResponse::ok("noop", format!("handled: {}", task.title)))
        }
    }

    #[test]
    fn agent_is_object_safe() {
        let agent: Box<dyn Agent> = Box::new(NoopAgent);
        assert_eq!(agent.name(), "noop");
        assert!(agent.can_handle(TaskType::Development));
        assert!(!agent.can_handle(TaskType::Documentation));
    }

    #[tokio::test]
    async fn noop_agent_handles_task_and_message() {
        let agent = NoopAgent;
        let task = Task::new("t", "d", TaskType::Development, TaskPriority::Medium);

        let response = agent.handle_task(&task).await.unwrap();
        assert!(response.success);
        assert_eq!(response.content, "handled: t");

        let message = AgentMessage::new("caller", "noop", "hello");
        let response = agent.process_message(message).await.unwrap();
        assert_eq!(response.content, "echo: hello");
    }

    #[test]
    fn capability_display_roundtrip() {
        let variants = [
            Capability::Planning,
            Capability::Coding,
            Capability::Testing,
            Capability::SecurityAnalysis,
            Capability::Documentation,
            Capability::CodeReview,
            Capability::TaskDecomposition,
            Capability::Evaluation,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: Capability = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn capability_invalid() {
        let result = "juggling".parse::<Capability>();
        assert!(result.is_err());
    }

    #[test]
    fn response_helpers_set_flags() {
        let ok = AgentResponse::ok("a", "done");
        assert!(ok.success);
        assert!(!ok.needs_correction);

        let failed = AgentResponse::failure("a", "broke");
        assert!(!failed.success);
    }
}
