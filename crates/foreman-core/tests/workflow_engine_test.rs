//! Integration tests for the workflow engine: DAG ordering, bounded
//! parallelism, failure propagation, cancellation, and timeouts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use foreman_core::workflow::templates;
use foreman_core::workflow::{StepType, Workflow, WorkflowEngine, WorkflowStatus, WorkflowStep};
use foreman_core::Capability;
use foreman_test_utils::ScriptedAgent;

/// Engine with one scripted agent per feature-development step.
fn feature_engine() -> WorkflowEngine {
    let mut engine = WorkflowEngine::new();
    engine.register_agents([
        ScriptedAgent::new("planner", vec![Capability::Planning]).build(),
        ScriptedAgent::new("developer", vec![Capability::Coding]).build(),
        ScriptedAgent::new("tester", vec![Capability::Testing]).build(),
        ScriptedAgent::new("security", vec![Capability::SecurityAnalysis]).build(),
        ScriptedAgent::new("docs", vec![Capability::Documentation]).build(),
    ]);
    engine
}

#[tokio::test]
async fn feature_workflow_completes_with_outputs_for_every_step() {
    let engine = feature_engine();
    let mut workflow = templates::feature_development();

    let result = engine.execute(&mut workflow, None).await;

    assert!(result.success, "error: {:?}", result.error_message);
    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(workflow.status, WorkflowStatus::Completed);

    for name in [
        "planning",
        "architecture",
        "development",
        "testing",
        "security_review",
        "documentation",
    ] {
        assert!(result.outputs.contains_key(name), "missing output for {name}");
        let step = workflow.get_step_by_name(name).unwrap();
        assert_eq!(step.status, WorkflowStatus::Completed, "step {name}");
    }

    // Documentation starts only after both testing and security complete.
    let docs_started = workflow
        .get_step_by_name("documentation")
        .unwrap()
        .started_at
        .unwrap();
    for gate in ["testing", "security_review"] {
        let completed = workflow
            .get_step_by_name(gate)
            .unwrap()
            .completed_at
            .unwrap();
        assert!(
            docs_started >= completed,
            "documentation started before {gate} completed"
        );
    }
}

#[tokio::test]
async fn failing_step_blocks_downstream_steps() {
    let mut engine = feature_engine();
    // Replace the developer with one whose handler errors.
    engine.register_agent(
        ScriptedAgent::new("developer", vec![Capability::Coding])
            .failing_with("compiler exploded")
            .build(),
    );
    let mut workflow = templates::feature_development();

    let result = engine.execute(&mut workflow, None).await;

    assert!(!result.success);
    assert_eq!(result.status, WorkflowStatus::Failed);
    let message = result.error_message.unwrap();
    assert_eq!(message, "Workflow blocked: steps failed: [\"development\"]");

    assert_eq!(
        workflow.get_step_by_name("development").unwrap().status,
        WorkflowStatus::Failed
    );
    for untouched in ["testing", "security_review", "documentation"] {
        assert_eq!(
            workflow.get_step_by_name(untouched).unwrap().status,
            WorkflowStatus::Pending,
            "step {untouched} should stay pending"
        );
    }
    // Upstream steps completed normally.
    for done in ["planning", "architecture"] {
        assert_eq!(
            workflow.get_step_by_name(done).unwrap().status,
            WorkflowStatus::Completed
        );
    }
}

#[tokio::test]
async fn no_step_remains_running_after_execute() {
    let mut engine = feature_engine();
    engine.register_agent(
        ScriptedAgent::new("tester", vec![Capability::Testing])
            .failing_with("assertion failed")
            .build(),
    );
    let mut workflow = templates::feature_development();

    let _ = engine.execute(&mut workflow, None).await;

    for step in &workflow.steps {
        assert!(
            matches!(
                step.status,
                WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Pending
            ),
            "step {} left in {}",
            step.name,
            step.status
        );
    }
}

#[tokio::test]
async fn parallel_cap_of_one_serializes_independent_steps() {
    let agent = Arc::new(
        ScriptedAgent::new("worker", vec![Capability::Coding])
            .with_delay(Duration::from_millis(20)),
    );
    let mut engine = WorkflowEngine::new().with_max_parallel_steps(1);
    engine.register_agent(agent.clone());

    let mut workflow = Workflow::new("fanout", "independent steps");
    for name in ["one", "two", "three"] {
        workflow.add_step(
            WorkflowStep::new(name, StepType::Task).with_config("agent", json!("worker")),
        );
    }

    let result = engine.execute(&mut workflow, None).await;
    assert!(result.success);

    // With a cap of one, invocations never overlap.
    let calls = agent.calls();
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert!(
            pair[1].started_at >= pair[0].finished_at,
            "steps overlapped under max_parallel_steps = 1"
        );
    }
}

#[tokio::test]
async fn inputs_merge_into_variables_and_drive_conditions() {
    let engine = WorkflowEngine::new();
    let mut workflow = Workflow::new("gated", "condition demo");
    workflow.add_step(
        WorkflowStep::new("check", StepType::Condition).with_condition("channel == stable"),
    );

    let mut inputs = HashMap::new();
    inputs.insert("channel".to_string(), json!("stable"));
    let result = engine.execute(&mut workflow, Some(inputs)).await;

    assert!(result.success);
    assert_eq!(result.outputs["check"]["result"], true);
    assert_eq!(workflow.variables["channel"], "stable");
}

#[tokio::test]
async fn cyclic_workflow_fails_eagerly() {
    let engine = WorkflowEngine::new();
    let mut workflow = Workflow::new("cyclic", "bad config");
    let a_id = uuid::Uuid::new_v4();
    let b_id = uuid::Uuid::new_v4();
    let mut a = WorkflowStep::new("a", StepType::Task);
    a.id = a_id;
    a.dependencies = vec![b_id];
    let mut b = WorkflowStep::new("b", StepType::Task);
    b.id = b_id;
    b.dependencies = vec![a_id];
    workflow.add_step(a);
    workflow.add_step(b);

    let result = engine.execute(&mut workflow, None).await;

    assert!(!result.success);
    let message = result.error_message.unwrap();
    assert!(message.contains("configuration error"), "got: {message}");
    assert!(message.contains("cycle"), "got: {message}");
    // No step was launched.
    assert!(workflow.steps.iter().all(|s| s.status == WorkflowStatus::Pending));
}

#[tokio::test]
async fn step_timeout_is_a_distinct_failure() {
    let engine = WorkflowEngine::new();
    let mut workflow = Workflow::new("slowpoke", "timeout demo");
    workflow.add_step(
        WorkflowStep::new("stall", StepType::Wait)
            .with_config("seconds", json!(30.0))
            .with_timeout(1),
    );

    tokio::time::pause();
    let result = engine.execute(&mut workflow, None).await;

    assert!(!result.success);
    let step = workflow.get_step_by_name("stall").unwrap();
    assert_eq!(step.status, WorkflowStatus::Failed);
    let error = step.error.as_deref().unwrap();
    assert!(error.contains("timed out after 1s"), "got: {error}");
}

#[tokio::test]
async fn cancel_stops_the_run_cooperatively() {
    let agent = ScriptedAgent::new("worker", vec![Capability::Coding])
        .with_delay(Duration::from_millis(500))
        .build();
    let mut engine = WorkflowEngine::new();
    engine.register_agent(agent);
    let engine = Arc::new(engine);

    let mut workflow = Workflow::new("long", "cancelled mid-run");
    let first = workflow.add_step(
        WorkflowStep::new("first", StepType::Task).with_config("agent", json!("worker")),
    );
    workflow.add_step(
        WorkflowStep::new("second", StepType::Task)
            .with_config("agent", json!("worker"))
            .with_dependencies(vec![first]),
    );
    let workflow_id = workflow.id;

    let engine_clone = Arc::clone(&engine);
    let handle = tokio::spawn(async move {
        let mut workflow = workflow;
        let result = engine_clone.execute(&mut workflow, None).await;
        (result, workflow)
    });

    // Wait for the run to appear, then cancel it.
    for _ in 0..100 {
        if engine.running().contains(&workflow_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(engine.cancel(workflow_id));
    assert_eq!(engine.get_status(workflow_id), Some(WorkflowStatus::Cancelled));

    let (result, workflow) = handle.await.unwrap();
    assert!(!result.success);
    assert_eq!(result.status, WorkflowStatus::Cancelled);
    assert_eq!(workflow.status, WorkflowStatus::Cancelled);
    // The dependent step was never launched.
    assert_eq!(
        workflow.get_step_by_name("second").unwrap().status,
        WorkflowStatus::Pending
    );

    // A finished workflow can no longer be cancelled.
    assert!(!engine.cancel(workflow_id));
}

#[tokio::test]
async fn results_are_queryable_after_completion() {
    let engine = feature_engine();
    let mut workflow = templates::bug_fix();
    let workflow_id = workflow.id;

    assert!(engine.get_status(workflow_id).is_none());
    let result = engine.execute(&mut workflow, None).await;
    assert!(result.success);

    assert_eq!(engine.get_status(workflow_id), Some(WorkflowStatus::Completed));
    let stored = engine.get_result(workflow_id).unwrap();
    assert_eq!(stored.workflow_id, workflow_id);
    assert_eq!(stored.outputs.len(), 3);
    assert!(engine.running().is_empty());
}

#[tokio::test]
async fn pause_is_advisory_and_visible() {
    let agent = ScriptedAgent::new("worker", vec![Capability::Coding])
        .with_delay(Duration::from_millis(30))
        .build();
    let mut engine = WorkflowEngine::new();
    engine.register_agent(agent);
    let engine = Arc::new(engine);

    let mut workflow = Workflow::new("pausable", "advisory pause");
    workflow.add_step(
        WorkflowStep::new("only", StepType::Task).with_config("agent", json!("worker")),
    );
    let workflow_id = workflow.id;

    let engine_clone = Arc::clone(&engine);
    let handle = tokio::spawn(async move {
        let mut workflow = workflow;
        engine_clone.execute(&mut workflow, None).await
    });

    for _ in 0..100 {
        if engine.running().contains(&workflow_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    if engine.pause(workflow_id) {
        assert_eq!(engine.get_status(workflow_id), Some(WorkflowStatus::Paused));
    }

    // The run still finishes; pause does not block completion.
    let result = handle.await.unwrap();
    assert!(result.success);
}
