//! Core engine for the foreman multi-agent work orchestrator.
//!
//! The crate is organized around four subsystems:
//!
//! - [`task`]: the task model, retry policy, priority/dependency queue, and
//!   reusable task templates.
//! - [`agent`]: the [`agent::Agent`] contract, the capability-indexed
//!   registry, and task-to-agent routing.
//! - [`correction`]: the bounded evaluate-correct-re-evaluate loop built on
//!   the [`evaluate::Evaluator`] contract.
//! - [`workflow`]: DAG workflow definitions and the bounded-parallel
//!   execution engine.
//!
//! The [`orchestrator::Orchestrator`] facade composes all of the above with
//! the [`conversation::ConversationManager`]. All state is in-process; the
//! crate performs no I/O beyond invoking the registered agents.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod correction;
pub mod error;
pub mod evaluate;
pub mod orchestrator;
pub mod task;
pub mod workflow;

// Re-export the primary public API at the crate level.
pub use agent::{Agent, AgentMessage, AgentRegistry, AgentResponse, Capability};
pub use config::{Config, Environment};
pub use conversation::{Conversation, ConversationManager, ConversationMode, ConversationStatus};
pub use correction::{CorrectionLoop, CorrectionOutcome, CorrectionStatus};
pub use error::OrchestratorError;
pub use evaluate::{EvaluationFinding, EvaluationResult, Evaluator, Severity};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorStatus};
pub use task::{
    Artifact, RetryConfig, RetryState, RetryStrategy, Task, TaskPriority, TaskQueue, TaskResult,
    TaskStatus, TaskType,
};
pub use workflow::{
    ExecutionResult, StepType, Workflow, WorkflowEngine, WorkflowStatus, WorkflowStep,
};
