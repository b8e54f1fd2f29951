//! Task-to-agent routing.
//!
//! Each task type maps to a closed set of required capabilities; candidate
//! agents are collected from the registry's capability index in registration
//! order, de-duplicated, and filtered through [`Agent::can_handle`].

use std::collections::HashSet;
use std::sync::Arc;

use super::{Agent, AgentRegistry, Capability};
use crate::task::{Task, TaskType};

/// The capabilities required to handle each task type.
pub fn required_capabilities(task_type: TaskType) -> &'static [Capability] {
    match task_type {
        TaskType::Planning => &[Capability::Planning, Capability::TaskDecomposition],
        TaskType::Development => &[Capability::Coding],
        TaskType::Testing => &[Capability::Testing],
        TaskType::SecurityReview => &[Capability::SecurityAnalysis],
        TaskType::Documentation => &[Capability::Documentation],
        TaskType::CodeReview => &[Capability::CodeReview, Capability::Evaluation],
        TaskType::BugFix => &[Capability::Coding, Capability::Testing],
        TaskType::Feature => &[Capability::Planning, Capability::Coding],
    }
}

impl AgentRegistry {
    /// Find agents suitable for a task.
    ///
    /// Iterates the required capabilities for the task's type, collects the
    /// agents registered under any of them (de-duplicated, preserving
    /// registration order), and keeps those whose `can_handle` accepts the
    /// task type. The first entry is the dispatch choice.
    pub fn agents_for_task(&self, task: &Task) -> Vec<Arc<dyn Agent>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut suitable = Vec::new();

        for capability in required_capabilities(task.task_type) {
            for agent in self.agents_by_capability(*capability) {
                if seen.insert(agent.name().to_string()) && agent.can_handle(task.task_type) {
                    suitable.push(agent);
                }
            }
        }

        suitable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentMessage, AgentResponse};
    use crate::task::TaskPriority;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FakeAgent {
        agent_name: String,
        caps: Vec<Capability>,
        handles: Vec<TaskType>,
    }

    impl FakeAgent {
        fn new(name: &str, caps: Vec<Capability>, handles: Vec<TaskType>) -> Arc<dyn Agent> {
            Arc::new(Self {
                agent_name: name.to_string(),
                caps,
                handles,
            })
        }
    }

    #[async_trait]
    impl Agent for FakeAgent {
        fn name(&self) -> &str {
            &self.agent_name
        }

        fn description(&self) -> &str {
            "fake"
        }

        fn capabilities(&self) -> &[Capability] {
            &self.caps
        }

        fn can_handle(&self, task_type: TaskType) -> bool {
            self.handles.contains(&task_type)
        }

        async fn process_message(&self, _message: AgentMessage) -> Result<AgentResponse> {
            Ok(AgentResponse::ok(&self.agent_name, "ok"))
        }

        async fn handle_task(&self, _task: &Task) -> Result<AgentResponse> {
            Ok(AgentResponse::ok(&self.agent_name, "ok"))
        }
    }

    fn task(task_type: TaskType) -> Task {
        Task::new("t", "d", task_type, TaskPriority::Medium)
    }

    #[test]
    fn every_task_type_has_required_capabilities() {
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
            assert!(
                !required_capabilities(task_type).is_empty(),
                "task type {task_type} must require at least one capability"
            );
        }
    }

    #[test]
    fn bug_fix_requires_coding_and_testing() {
        assert_eq!(
            required_capabilities(TaskType::BugFix),
            &[Capability::Coding, Capability::Testing]
        );
    }

    #[test]
    fn no_agents_means_no_candidates() {
        let registry = AgentRegistry::new();
        assert!(registry.agents_for_task(&task(TaskType::Development)).is_empty());
    }

    #[test]
    fn candidates_follow_registration_order() {
        let mut registry = AgentRegistry::new();
        registry.register(FakeAgent::new(
            "dev-one",
            vec![Capability::Coding],
            vec![TaskType::Development],
        ));
        registry.register(FakeAgent::new(
            "dev-two",
            vec![Capability::Coding],
            vec![TaskType::Development],
        ));

        let candidates = registry.agents_for_task(&task(TaskType::Development));
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name(), "dev-one");
        assert_eq!(candidates[1].name(), "dev-two");
    }

    #[test]
    fn candidates_are_deduplicated_across_capabilities() {
        // A bug_fix task requires coding AND testing; an agent with both
        // must appear only once.
        let mut registry = AgentRegistry::new();
        registry.register(FakeAgent::new(
            "fullstack",
            vec![Capability::Coding, Capability::Testing],
            vec![TaskType::BugFix],
        ));

        let candidates = registry.agents_for_task(&task(TaskType::BugFix));
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn can_handle_filters_candidates() {
        let mut registry = AgentRegistry::new();
        registry.register(FakeAgent::new(
            "narrow",
            vec![Capability::Coding],
            vec![TaskType::BugFix], // refuses plain development
        ));
        registry.register(FakeAgent::new(
            "broad",
            vec![Capability::Coding],
            vec![TaskType::Development, TaskType::BugFix],
        ));

        let candidates = registry.agents_for_task(&task(TaskType::Development));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name(), "broad");
    }

    #[test]
    fn feature_tasks_gather_planners_and_coders() {
        let mut registry = AgentRegistry::new();
        registry.register(FakeAgent::new(
            "planner",
            vec![Capability::Planning],
            vec![TaskType::Feature],
        ));
        registry.register(FakeAgent::new(
            "coder",
            vec![Capability::Coding],
            vec![TaskType::Feature],
        ));

        let candidates = registry.agents_for_task(&task(TaskType::Feature));
        assert_eq!(candidates.len(), 2);
        // Planning is listed before coding in the requirement table.
        assert_eq!(candidates[0].name(), "planner");
    }
}
