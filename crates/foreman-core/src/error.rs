//! Failure taxonomy for the orchestrator core.
//!
//! Every public operation that can fail reports one of these kinds so
//! callers can discriminate routing problems from agent failures, timeouts,
//! blocked dependencies, correction exhaustion, configuration mistakes, and
//! user-initiated cancellation.

use thiserror::Error;

use crate::task::TaskType;

/// Errors surfaced by the orchestrator core.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No registered agent advertises a capability matching the task type.
    #[error("no suitable agent found for task type: {task_type}")]
    NoSuitableAgent {
        /// The task type that could not be routed.
        task_type: TaskType,
    },

    /// An agent reported a failure while handling a task or message.
    #[error("agent {agent:?} failed: {message}")]
    AgentFailure {
        /// Name of the failing agent.
        agent: String,
        /// Failure description from the agent.
        message: String,
        /// Whether the failure is eligible for retry.
        retryable: bool,
    },

    /// A workflow step exceeded its configured timeout.
    #[error("step {step:?} timed out after {seconds}s")]
    StepTimeout {
        /// Name of the step that timed out.
        step: String,
        /// The configured bound in seconds.
        seconds: u64,
    },

    /// A workflow cannot make progress because dependencies failed.
    #[error("Workflow blocked: steps failed: {0:?}")]
    WorkflowBlocked(Vec<String>),

    /// The correction loop reached its iteration cap without passing.
    #[error("correction loop exhausted after {iterations} iterations")]
    CorrectionExhausted {
        /// Iterations consumed before giving up.
        iterations: u32,
    },

    /// Invalid configuration: cyclic dependencies, unknown references, etc.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The operation was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,
}

impl OrchestratorError {
    /// Short machine-readable kind tag, suitable for result metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoSuitableAgent { .. } => "routing",
            Self::AgentFailure { .. } => "agent",
            Self::StepTimeout { .. } => "timeout",
            Self::WorkflowBlocked(_) => "dependency",
            Self::CorrectionExhausted { .. } => "correction_exhausted",
            Self::Configuration(_) => "configuration",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_error_lists_step_names() {
        let err = OrchestratorError::WorkflowBlocked(vec!["development".to_string()]);
        assert_eq!(
            err.to_string(),
            "Workflow blocked: steps failed: [\"development\"]"
        );
        assert_eq!(err.kind(), "dependency");
    }

    #[test]
    fn routing_error_names_task_type() {
        let err = OrchestratorError::NoSuitableAgent {
            task_type: TaskType::SecurityReview,
        };
        assert!(err.to_string().contains("security_review"));
        assert_eq!(err.kind(), "routing");
    }

    #[test]
    fn kind_tags_are_distinct() {
        let errors = [
            OrchestratorError::NoSuitableAgent {
                task_type: TaskType::Development,
            },
            OrchestratorError::AgentFailure {
                agent: "dev".to_string(),
                message: "boom".to_string(),
                retryable: true,
            },
            OrchestratorError::StepTimeout {
                step: "wait".to_string(),
                seconds: 5,
            },
            OrchestratorError::WorkflowBlocked(vec![]),
            OrchestratorError::CorrectionExhausted { iterations: 3 },
            OrchestratorError::Configuration("bad".to_string()),
            OrchestratorError::Cancelled,
        ];
        let mut kinds: Vec<&str> = errors.iter().map(|e| e.kind()).collect();
        let original_len = kinds.len();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), original_len);
    }
}
