//! Bounded-parallel DAG executor.
//!
//! Repeatedly computes the ready frontier, launches up to
//! `max_parallel_steps` steps concurrently, awaits the wave, and records
//! each outcome. A failed step is never retried by the engine (retry is a
//! task-level concern); downstream steps stay pending and the run
//! terminates blocked. Cancellation is cooperative: the token is checked at
//! every frontier and inside wait steps.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::Agent;
use crate::error::OrchestratorError;
use crate::task::{Task, TaskPriority, TaskType};

use super::{StepType, Workflow, WorkflowStatus, WorkflowStep};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of executing a workflow to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub workflow_id: Uuid,
    pub success: bool,
    pub status: WorkflowStatus,
    /// Mapping-shaped results of completed steps, keyed by step name.
    pub outputs: HashMap<String, Value>,
    /// Every step outcome, keyed by step id.
    pub step_results: HashMap<Uuid, Value>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub execution_time_ms: f64,
}

/// Book-keeping for a workflow currently being executed.
struct RunHandle {
    cancel: CancellationToken,
    status: WorkflowStatus,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Executes workflow DAGs with bounded step parallelism.
pub struct WorkflowEngine {
    agents: HashMap<String, Arc<dyn Agent>>,
    max_parallel_steps: usize,
    running: Mutex<HashMap<Uuid, RunHandle>>,
    results: Mutex<HashMap<Uuid, ExecutionResult>>,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowEngine {
    /// Create an engine with the default parallelism cap of 5.
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            max_parallel_steps: 5,
            running: Mutex::new(HashMap::new()),
            results: Mutex::new(HashMap::new()),
        }
    }

    /// Override the step parallelism cap.
    pub fn with_max_parallel_steps(mut self, max_parallel_steps: usize) -> Self {
        self.max_parallel_steps = max_parallel_steps.max(1);
        self
    }

    /// Register an agent under the name returned by [`Agent::name`].
    pub fn register_agent(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.name().to_string(), agent);
    }

    /// Register several agents at once.
    pub fn register_agents(&mut self, agents: impl IntoIterator<Item = Arc<dyn Agent>>) {
        for agent in agents {
            self.register_agent(agent);
        }
    }

    /// Execute a workflow, mutating its steps' statuses in place.
    ///
    /// Steps:
    /// 1. Validate the step graph eagerly (cycles, dangling references).
    /// 2. Transition the workflow to running, merge `inputs` into variables.
    /// 3. Loop: compute the ready frontier, launch up to the parallelism
    ///    cap, await the wave, record outcomes. Stop when nothing is
    ///    pending, when pending steps are blocked by failures, or on
    ///    cancellation.
    /// 4. Finalize status, outputs, and timing.
    pub async fn execute(
        &self,
        workflow: &mut Workflow,
        inputs: Option<HashMap<String, Value>>,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let timer = std::time::Instant::now();

        if let Err(e) = workflow.validate() {
            let error = OrchestratorError::Configuration(e.to_string());
            let result = ExecutionResult {
                workflow_id: workflow.id,
                success: false,
                status: WorkflowStatus::Failed,
                outputs: HashMap::new(),
                step_results: HashMap::new(),
                error_message: Some(error.to_string()),
                started_at,
                completed_at: Utc::now(),
                execution_time_ms: timer.elapsed().as_secs_f64() * 1000.0,
            };
            self.results.lock().insert(workflow.id, result.clone());
            return result;
        }

        workflow.status = WorkflowStatus::Running;
        workflow.started_at = Some(started_at);
        if let Some(inputs) = inputs {
            workflow.variables.extend(inputs);
        }

        let cancel = CancellationToken::new();
        self.running.lock().insert(
            workflow.id,
            RunHandle {
                cancel: cancel.clone(),
                status: WorkflowStatus::Running,
            },
        );

        tracing::info!(
            workflow_id = %workflow.id,
            workflow_name = %workflow.name,
            steps = workflow.steps.len(),
            "workflow execution started"
        );

        let mut completed: HashSet<Uuid> = HashSet::new();
        let mut step_results: HashMap<Uuid, Value> = HashMap::new();
        let mut outputs: HashMap<String, Value> = HashMap::new();
        let mut error_message: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                workflow.status = WorkflowStatus::Cancelled;
                error_message = Some(OrchestratorError::Cancelled.to_string());
                break;
            }

            let ready_ids: Vec<Uuid> = workflow
                .get_ready_steps(&completed)
                .iter()
                .map(|s| s.id)
                .collect();

            if ready_ids.is_empty() {
                let pending_exists = workflow
                    .steps
                    .iter()
                    .any(|s| s.status == WorkflowStatus::Pending);
                if !pending_exists {
                    break;
                }
                let failed_names: Vec<String> = workflow
                    .steps
                    .iter()
                    .filter(|s| s.status == WorkflowStatus::Failed)
                    .map(|s| s.name.clone())
                    .collect();
                if !failed_names.is_empty() {
                    error_message =
                        Some(OrchestratorError::WorkflowBlocked(failed_names).to_string());
                }
                break;
            }

            // Launch a wave of up to max_parallel_steps ready steps.
            let wave: Vec<WorkflowStep> = ready_ids
                .iter()
                .take(self.max_parallel_steps)
                .filter_map(|id| workflow.get_step(*id).cloned())
                .collect();

            for step in &wave {
                if let Some(live) = workflow.get_step_mut(step.id) {
                    live.status = WorkflowStatus::Running;
                    live.started_at = Some(Utc::now());
                }
            }

            let variables = workflow.variables.clone();
            let step_futures = wave
                .iter()
                .map(|step| self.execute_step(step, &variables, &cancel));
            let wave_outcomes = futures::future::join_all(step_futures).await;

            let workflow_id = workflow.id;
            for (step_snapshot, outcome) in wave.iter().zip(wave_outcomes) {
                let Some(step) = workflow.get_step_mut(step_snapshot.id) else {
                    continue;
                };
                step.completed_at = Some(Utc::now());
                match outcome {
                    Ok(value) => {
                        step.status = WorkflowStatus::Completed;
                        step.result = Some(value.clone());
                        step_results.insert(step.id, value.clone());
                        completed.insert(step.id);
                        if value.is_object() {
                            outputs.insert(step.name.clone(), value);
                        }
                        tracing::debug!(
                            workflow_id = %workflow_id,
                            step = %step.name,
                            "step completed"
                        );
                    }
                    Err(e) => {
                        let text = e.to_string();
                        step.status = WorkflowStatus::Failed;
                        step.error = Some(text.clone());
                        step_results.insert(step.id, json!({ "error": text }));
                        tracing::warn!(
                            workflow_id = %workflow_id,
                            step = %step.name,
                            error = %text,
                            "step failed"
                        );
                    }
                }
            }
        }

        // Finalize.
        if workflow.status != WorkflowStatus::Cancelled {
            let failed_names: Vec<String> = workflow
                .steps
                .iter()
                .filter(|s| s.status == WorkflowStatus::Failed)
                .map(|s| s.name.clone())
                .collect();
            if failed_names.is_empty() && error_message.is_none() {
                workflow.status = WorkflowStatus::Completed;
            } else {
                workflow.status = WorkflowStatus::Failed;
                if error_message.is_none() {
                    error_message = Some(format!("Steps failed: {failed_names:?}"));
                }
            }
        }

        let completed_at = Utc::now();
        workflow.completed_at = Some(completed_at);
        let success = workflow.status == WorkflowStatus::Completed;

        tracing::info!(
            workflow_id = %workflow.id,
            status = %workflow.status,
            success = success,
            "workflow execution finished"
        );

        let result = ExecutionResult {
            workflow_id: workflow.id,
            success,
            status: workflow.status,
            outputs,
            step_results,
            error_message,
            started_at,
            completed_at,
            execution_time_ms: timer.elapsed().as_secs_f64() * 1000.0,
        };

        self.running
            .lock()
            .remove(&workflow.id);
        self.results
            .lock()
            .insert(workflow.id, result.clone());

        result
    }

    /// Execute one step, applying its timeout if configured.
    async fn execute_step(
        &self,
        step: &WorkflowStep,
        variables: &HashMap<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        match step.timeout_seconds {
            Some(seconds) => {
                let bound = Duration::from_secs(seconds);
                match tokio::time::timeout(bound, self.dispatch_step(step, variables, cancel))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_elapsed) => Err(OrchestratorError::StepTimeout {
                        step: step.name.clone(),
                        seconds,
                    }
                    .into()),
                }
            }
            None => self.dispatch_step(step, variables, cancel).await,
        }
    }

    /// Dispatch a step by its type.
    async fn dispatch_step(
        &self,
        step: &WorkflowStep,
        variables: &HashMap<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        match step.step_type {
            StepType::Task => self.run_task_step(step).await,
            StepType::AgentAction => {
                let agent_name = config_str(step, "agent").unwrap_or_default();
                let action = config_str(step, "action").unwrap_or_else(|| "process".to_string());
                if self.agents.contains_key(&agent_name) {
                    Ok(json!({ "success": true, "agent": agent_name, "action": action }))
                } else {
                    Ok(json!({
                        "success": false,
                        "error": format!("Agent '{agent_name}' not found"),
                    }))
                }
            }
            StepType::Conversation => {
                let participants = step
                    .config
                    .get("participants")
                    .cloned()
                    .unwrap_or_else(|| json!([]));
                let topic = config_str(step, "topic").unwrap_or_else(|| "Discussion".to_string());
                Ok(json!({
                    "success": true,
                    "topic": topic,
                    "participants": participants,
                    "turns": 0,
                }))
            }
            StepType::Condition => {
                let expression = step
                    .condition
                    .clone()
                    .or_else(|| config_str(step, "condition"));
                let result = evaluate_condition(expression.as_deref(), variables);
                Ok(json!({
                    "success": true,
                    "condition": expression,
                    "result": result,
                }))
            }
            StepType::Parallel => {
                let count = step
                    .config
                    .get("steps")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Ok(json!({ "success": true, "sub_steps_count": count }))
            }
            StepType::Wait => {
                let seconds = step
                    .config
                    .get("seconds")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0)
                    .max(0.0);
                if seconds > 0.0 {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => {}
                        _ = cancel.cancelled() => {
                            return Err(OrchestratorError::Cancelled.into());
                        }
                    }
                }
                Ok(json!({ "success": true, "waited_seconds": seconds }))
            }
            StepType::Loop | StepType::Approval => Ok(json!({
                "success": true,
                "step_type": step.step_type.to_string(),
            })),
        }
    }

    /// Run a task-type step through its configured agent.
    async fn run_task_step(&self, step: &WorkflowStep) -> Result<Value> {
        let agent_name = config_str(step, "agent");
        let Some(agent) = agent_name.as_deref().and_then(|name| self.agents.get(name)) else {
            return Ok(json!({
                "success": true,
                "content": format!("Task step '{}' completed (no agent assigned)", step.name),
                "agent": Value::Null,
            }));
        };

        let task_type = config_str(step, "task_type")
            .and_then(|s| s.parse::<TaskType>().ok())
            .unwrap_or(TaskType::Development);
        let description =
            config_str(step, "description").unwrap_or_else(|| step.name.clone());

        let task = Task::new(step.name.clone(), description, task_type, TaskPriority::Medium);
        let response = agent.handle_task(&task).await?;

        Ok(json!({
            "success": response.success,
            "content": response.content,
            "agent": agent.name(),
            "artifacts": serde_json::to_value(&response.artifacts).unwrap_or_default(),
        }))
    }

    /// Status of a workflow: running entry first, then recorded results.
    pub fn get_status(&self, workflow_id: Uuid) -> Option<WorkflowStatus> {
        if let Some(handle) = self
            .running
            .lock()
            .get(&workflow_id)
        {
            return Some(handle.status);
        }
        self.results
            .lock()
            .get(&workflow_id)
            .map(|r| r.status)
    }

    /// Result of a finished workflow.
    pub fn get_result(&self, workflow_id: Uuid) -> Option<ExecutionResult> {
        self.results
            .lock()
            .get(&workflow_id)
            .cloned()
    }

    /// Cooperatively cancel a running workflow. Returns `false` if it is
    /// not running.
    pub fn cancel(&self, workflow_id: Uuid) -> bool {
        let mut running = self.running.lock();
        match running.get_mut(&workflow_id) {
            Some(handle) => {
                handle.status = WorkflowStatus::Cancelled;
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Mark a running workflow paused. Advisory: in-flight steps continue
    /// and the caller observes the status through [`Self::get_status`].
    pub fn pause(&self, workflow_id: Uuid) -> bool {
        let mut running = self.running.lock();
        match running.get_mut(&workflow_id) {
            Some(handle) => {
                handle.status = WorkflowStatus::Paused;
                true
            }
            None => false,
        }
    }

    /// Ids of workflows currently executing.
    pub fn running(&self) -> Vec<Uuid> {
        self.running
            .lock()
            .keys()
            .copied()
            .collect()
    }
}

/// Read a string-valued config key from a step.
fn config_str(step: &WorkflowStep, key: &str) -> Option<String> {
    step.config
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Evaluate a condition expression against workflow variables.
///
/// Supported forms: `name` (truthiness of the variable), `name == literal`,
/// and `name != literal`. A missing expression evaluates to true; a missing
/// variable is falsy.
fn evaluate_condition(expression: Option<&str>, variables: &HashMap<String, Value>) -> bool {
    let Some(expression) = expression else {
        return true;
    };
    let expression = expression.trim();
    if expression.is_empty() {
        return true;
    }

    if let Some((name, literal)) = split_operator(expression, "==") {
        return variables
            .get(name)
            .is_some_and(|value| value_matches(value, literal));
    }
    if let Some((name, literal)) = split_operator(expression, "!=") {
        return !variables
            .get(name)
            .is_some_and(|value| value_matches(value, literal));
    }

    variables.get(expression).is_some_and(is_truthy)
}

fn split_operator<'a>(expression: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    expression
        .split_once(op)
        .map(|(lhs, rhs)| (lhs.trim(), rhs.trim()))
}

/// Compare a variable value with an expression literal.
fn value_matches(value: &Value, literal: &str) -> bool {
    let literal = literal.trim_matches(|c| c == '"' || c == '\'');
    match value {
        Value::String(s) => s == literal,
        Value::Bool(b) => literal.parse::<bool>().is_ok_and(|parsed| parsed == *b),
        Value::Number(n) => literal
            .parse::<f64>()
            .is_ok_and(|parsed| n.as_f64().is_some_and(|v| (v - parsed).abs() < f64::EPSILON)),
        _ => value.to_string() == literal,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_defaults_to_true() {
        assert!(evaluate_condition(None, &HashMap::new()));
        assert!(evaluate_condition(Some("  "), &HashMap::new()));
    }

    #[test]
    fn condition_truthiness() {
        let mut variables = HashMap::new();
        variables.insert("flag".to_string(), json!(true));
        variables.insert("empty".to_string(), json!(""));
        variables.insert("zero".to_string(), json!(0));

        assert!(evaluate_condition(Some("flag"), &variables));
        assert!(!evaluate_condition(Some("empty"), &variables));
        assert!(!evaluate_condition(Some("zero"), &variables));
        assert!(!evaluate_condition(Some("missing"), &variables));
    }

    #[test]
    fn condition_equality() {
        let mut variables = HashMap::new();
        variables.insert("channel".to_string(), json!("stable"));
        variables.insert("count".to_string(), json!(3));

        assert!(evaluate_condition(Some("channel == stable"), &variables));
        assert!(evaluate_condition(Some("channel == \"stable\""), &variables));
        assert!(!evaluate_condition(Some("channel == beta"), &variables));
        assert!(evaluate_condition(Some("channel != beta"), &variables));
        assert!(evaluate_condition(Some("count == 3"), &variables));
        assert!(!evaluate_condition(Some("missing == anything"), &variables));
        assert!(evaluate_condition(Some("missing != anything"), &variables));
    }

    #[tokio::test]
    async fn wait_step_reports_waited_seconds() {
        let engine = WorkflowEngine::new();
        let step = WorkflowStep::new("pause", StepType::Wait).with_config("seconds", json!(0.01));
        let cancel = CancellationToken::new();
        let result = engine
            .dispatch_step(&step, &HashMap::new(), &cancel)
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["waited_seconds"], 0.01);
    }

    #[tokio::test]
    async fn reserved_step_types_return_sentinels() {
        let engine = WorkflowEngine::new();
        let cancel = CancellationToken::new();
        for (step_type, tag) in [(StepType::Loop, "loop"), (StepType::Approval, "approval")] {
            let step = WorkflowStep::new("reserved", step_type);
            let result = engine
                .dispatch_step(&step, &HashMap::new(), &cancel)
                .await
                .unwrap();
            assert_eq!(result["success"], true);
            assert_eq!(result["step_type"], tag);
        }
    }

    #[tokio::test]
    async fn agent_action_reports_missing_agent() {
        let engine = WorkflowEngine::new();
        let cancel = CancellationToken::new();
        let step = WorkflowStep::new("act", StepType::AgentAction)
            .with_config("agent", json!("ghost"))
            .with_config("action", json!("ping"));
        let result = engine
            .dispatch_step(&step, &HashMap::new(), &cancel)
            .await
            .unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "Agent 'ghost' not found");
    }

    #[tokio::test]
    async fn task_step_without_agent_succeeds_with_sentinel() {
        let engine = WorkflowEngine::new();
        let cancel = CancellationToken::new();
        let step = WorkflowStep::new("orphan", StepType::Task);
        let result = engine
            .dispatch_step(&step, &HashMap::new(), &cancel)
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["agent"], Value::Null);
        assert!(result["content"].as_str().unwrap().contains("no agent assigned"));
    }

    #[tokio::test]
    async fn timeout_fails_step_with_timeout_error() {
        let engine = WorkflowEngine::new();
        let cancel = CancellationToken::new();
        let step = WorkflowStep::new("slow", StepType::Wait)
            .with_config("seconds", json!(5.0))
            .with_timeout(1);
        // Use a short timeout via execute_step directly; the wait would take
        // 5 seconds but the bound is 1 second (paused virtual clock keeps
        // this test fast).
        tokio::time::pause();
        let outcome = engine.execute_step(&step, &HashMap::new(), &cancel).await;
        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {err}");
    }
}
