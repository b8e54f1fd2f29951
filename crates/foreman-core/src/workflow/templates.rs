//! Pre-built workflow definitions for common scenarios.

use serde_json::json;

use super::{StepType, Workflow, WorkflowStep};

/// Standard workflow for developing a new feature:
/// planning -> architecture -> development -> (testing || security) ->
/// documentation.
pub fn feature_development() -> Workflow {
    let mut workflow = Workflow::new(
        "Feature Development",
        "Standard workflow for developing a new feature",
    );

    let planning = workflow.add_step(
        WorkflowStep::new("planning", StepType::Task)
            .with_config("task_type", json!("planning"))
            .with_config("agent", json!("planner"))
            .with_config(
                "description",
                json!("Plan and decompose the feature into tasks"),
            ),
    );

    let architecture = workflow.add_step(
        WorkflowStep::new("architecture", StepType::Task)
            .with_config("task_type", json!("planning"))
            .with_config("agent", json!("planner"))
            .with_config("description", json!("Design the architecture for the feature"))
            .with_dependencies(vec![planning]),
    );

    let development = workflow.add_step(
        WorkflowStep::new("development", StepType::Task)
            .with_config("task_type", json!("development"))
            .with_config("agent", json!("developer"))
            .with_config("description", json!("Implement the feature"))
            .with_dependencies(vec![architecture]),
    );

    let testing = workflow.add_step(
        WorkflowStep::new("testing", StepType::Task)
            .with_config("task_type", json!("testing"))
            .with_config("agent", json!("tester"))
            .with_config("description", json!("Test the implementation"))
            .with_dependencies(vec![development]),
    );

    let security = workflow.add_step(
        WorkflowStep::new("security_review", StepType::Task)
            .with_config("task_type", json!("security_review"))
            .with_config("agent", json!("security"))
            .with_config("description", json!("Security review of the implementation"))
            .with_dependencies(vec![development]),
    );

    workflow.add_step(
        WorkflowStep::new("documentation", StepType::Task)
            .with_config("task_type", json!("documentation"))
            .with_config("agent", json!("docs"))
            .with_config("description", json!("Document the feature"))
            .with_dependencies(vec![testing, security]),
    );

    workflow
}

/// Standard workflow for fixing a bug: research -> fix -> test.
pub fn bug_fix() -> Workflow {
    let mut workflow = Workflow::new("Bug Fix", "Standard workflow for fixing a bug");

    let research = workflow.add_step(
        WorkflowStep::new("research", StepType::Task)
            .with_config("task_type", json!("planning"))
            .with_config("agent", json!("planner"))
            .with_config("description", json!("Research the bug and identify root cause")),
    );

    let fix = workflow.add_step(
        WorkflowStep::new("fix", StepType::Task)
            .with_config("task_type", json!("bug_fix"))
            .with_config("agent", json!("developer"))
            .with_config("description", json!("Implement the fix"))
            .with_dependencies(vec![research]),
    );

    workflow.add_step(
        WorkflowStep::new("test", StepType::Task)
            .with_config("task_type", json!("testing"))
            .with_config("agent", json!("tester"))
            .with_config("description", json!("Test the fix"))
            .with_dependencies(vec![fix]),
    );

    workflow
}

/// Standard workflow for code review: a review discussion followed by a
/// security check.
pub fn code_review() -> Workflow {
    let mut workflow = Workflow::new("Code Review", "Standard workflow for code review");

    let discussion = workflow.add_step(
        WorkflowStep::new("review_discussion", StepType::Conversation)
            .with_config(
                "participants",
                json!(["developer", "tester", "security"]),
            )
            .with_config("topic", json!("Code Review Discussion"))
            .with_config("mode", json!("dynamic")),
    );

    workflow.add_step(
        WorkflowStep::new("security_check", StepType::Task)
            .with_config("task_type", json!("security_review"))
            .with_config("agent", json!("security"))
            .with_config("description", json!("Security analysis of the code"))
            .with_dependencies(vec![discussion]),
    );

    workflow
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn feature_development_is_a_valid_dag() {
        let workflow = feature_development();
        assert_eq!(workflow.steps.len(), 6);
        assert!(workflow.validate().is_ok());

        // documentation waits on both testing and security_review.
        let testing = workflow.get_step_by_name("testing").unwrap().id;
        let security = workflow.get_step_by_name("security_review").unwrap().id;
        let docs = workflow.get_step_by_name("documentation").unwrap();
        assert!(docs.dependencies.contains(&testing));
        assert!(docs.dependencies.contains(&security));
    }

    #[test]
    fn feature_development_frontier_starts_at_planning() {
        let workflow = feature_development();
        let ready: Vec<&str> = workflow
            .get_ready_steps(&HashSet::new())
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(ready, vec!["planning"]);
    }

    #[test]
    fn bug_fix_chain_is_sequential() {
        let workflow = bug_fix();
        assert!(workflow.validate().is_ok());
        let research = workflow.get_step_by_name("research").unwrap().id;
        let fix = workflow.get_step_by_name("fix").unwrap();
        assert_eq!(fix.dependencies, vec![research]);
    }

    #[test]
    fn code_review_starts_with_a_conversation() {
        let workflow = code_review();
        assert!(workflow.validate().is_ok());
        let discussion = workflow.get_step_by_name("review_discussion").unwrap();
        assert_eq!(discussion.step_type, StepType::Conversation);
    }
}
