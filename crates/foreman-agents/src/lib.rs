//! Built-in rule-based agents for the foreman orchestrator.
//!
//! These agents cover the full capability set with deterministic,
//! keyword-driven behavior. They are the handlers used when no LLM backend
//! is wired up: useful for local runs, demos, and exercising the
//! orchestration machinery end to end. Each agent produces typed artifacts
//! that downstream consumers can match on.

pub mod developer;
pub mod docs;
pub mod planner;
pub mod reviewer;
pub mod security;
pub mod tester;

pub use developer::DeveloperAgent;
pub use docs::DocsAgent;
pub use planner::PlannerAgent;
pub use reviewer::ReviewerAgent;
pub use security::SecurityAgent;
pub use tester::TesterAgent;

use std::sync::Arc;

use foreman_core::Agent;

/// The default agent roster, one agent per area of responsibility.
///
/// Together they cover every capability, so any task type can be routed.
pub fn default_agents() -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(PlannerAgent::new()),
        Arc::new(DeveloperAgent::new()),
        Arc::new(TesterAgent::new()),
        Arc::new(SecurityAgent::new()),
        Arc::new(DocsAgent::new()),
        Arc::new(ReviewerAgent::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::agent::required_capabilities;
    use foreman_core::task::TaskType;

    #[test]
    fn roster_covers_every_task_type() {
        let agents = default_agents();
        let types = [
            TaskType::Planning,
            TaskType::Development,
            TaskType::Testing,
            TaskType::SecurityReview,
            TaskType::Documentation,
            TaskType::CodeReview,
            TaskType::BugFix,
            TaskType::Feature,
        ];
        for task_type in types {
            let covered = required_capabilities(task_type).iter().any(|needed| {
                agents.iter().any(|agent| {
                    agent.capabilities().contains(needed) && agent.can_handle(task_type)
                })
            });
            assert!(covered, "no default agent can handle {task_type}");
        }
    }

    #[test]
    fn roster_names_are_unique() {
        let agents = default_agents();
        let mut names: Vec<&str> = agents.iter().map(|a| a.name()).collect();
        let original_len = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), original_len);
    }
}
