//! Workflow definitions: dependency-ordered DAGs of steps.
//!
//! A workflow holds steps, shared variables, and status. Steps reference
//! their dependencies by id; the ready set is every pending step whose
//! dependencies are all completed. Cycles are a configuration error and are
//! detected eagerly via [`Workflow::validate`].

pub mod engine;
pub mod format;
pub mod parser;
pub mod templates;

pub use engine::{ExecutionResult, WorkflowEngine};
pub use format::{StepDoc, WorkflowDoc};
pub use parser::{parse_workflow_toml, WorkflowParseError};

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a workflow or of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for WorkflowStatus {
    type Err = WorkflowStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(WorkflowStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`WorkflowStatus`] string.
#[derive(Debug, Clone)]
pub struct WorkflowStatusParseError(pub String);

impl fmt::Display for WorkflowStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid workflow status: {:?}", self.0)
    }
}

impl std::error::Error for WorkflowStatusParseError {}

// ---------------------------------------------------------------------------

/// Types of workflow steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Execute a task through an agent.
    Task,
    /// Direct agent action.
    AgentAction,
    /// Multi-agent conversation.
    Conversation,
    /// Conditional branching.
    Condition,
    /// Parallel bag of sub-steps.
    Parallel,
    /// Iteration (reserved).
    Loop,
    /// Cooperative wait.
    Wait,
    /// Human approval gate (reserved).
    Approval,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Task => "task",
            Self::AgentAction => "agent_action",
            Self::Conversation => "conversation",
            Self::Condition => "condition",
            Self::Parallel => "parallel",
            Self::Loop => "loop",
            Self::Wait => "wait",
            Self::Approval => "approval",
        };
        f.write_str(s)
    }
}

impl FromStr for StepType {
    type Err = StepTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "agent_action" => Ok(Self::AgentAction),
            "conversation" => Ok(Self::Conversation),
            "condition" => Ok(Self::Condition),
            "parallel" => Ok(Self::Parallel),
            "loop" => Ok(Self::Loop),
            "wait" => Ok(Self::Wait),
            "approval" => Ok(Self::Approval),
            other => Err(StepTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`StepType`] string.
#[derive(Debug, Clone)]
pub struct StepTypeParseError(pub String);

impl fmt::Display for StepTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid step type: {:?}", self.0)
    }
}

impl std::error::Error for StepTypeParseError {}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single node in a workflow DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    /// Unique within the workflow by convention; drives the outputs map.
    pub name: String,
    pub step_type: StepType,
    /// Configuration mapping; shape depends on the step type.
    #[serde(default)]
    pub config: HashMap<String, Value>,
    /// Ids of steps that must complete before this one starts.
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_step_max_retries")]
    pub max_retries: u32,
    /// Step to jump to on failure (reserved).
    #[serde(default)]
    pub on_failure: Option<Uuid>,
    /// Condition expression for condition-type steps.
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    // Execution state.
    pub status: WorkflowStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_step_max_retries() -> u32 {
    3
}

impl WorkflowStep {
    /// Create a pending step with no configuration.
    pub fn new(name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            step_type,
            config: HashMap::new(),
            dependencies: Vec::new(),
            timeout_seconds: None,
            retry_count: 0,
            max_retries: default_step_max_retries(),
            on_failure: None,
            condition: None,
            metadata: HashMap::new(),
            status: WorkflowStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Set a config key, consuming and returning the step.
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Set dependency step ids, consuming and returning the step.
    pub fn with_dependencies(mut self, dependencies: Vec<Uuid>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Set the execution timeout, consuming and returning the step.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Set the condition expression, consuming and returning the step.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A named DAG of steps with shared variables and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    /// Workflow-level variables, merged with execution inputs.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Workflow {
    /// Create an empty pending workflow, version `1.0.0`.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            version: "1.0.0".to_string(),
            status: WorkflowStatus::Pending,
            steps: Vec::new(),
            variables: HashMap::new(),
            input_schema: Value::Null,
            output_schema: Value::Null,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            metadata: HashMap::new(),
        }
    }

    /// Append a step, returning its id for dependency wiring.
    pub fn add_step(&mut self, step: WorkflowStep) -> Uuid {
        let id = step.id;
        self.steps.push(step);
        id
    }

    /// Get a step by id.
    pub fn get_step(&self, step_id: Uuid) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Get a mutable step by id.
    pub fn get_step_mut(&mut self, step_id: Uuid) -> Option<&mut WorkflowStep> {
        self.steps.iter_mut().find(|s| s.id == step_id)
    }

    /// Get a step by name.
    pub fn get_step_by_name(&self, name: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Steps ready to execute: pending, with every dependency completed.
    pub fn get_ready_steps(&self, completed: &HashSet<Uuid>) -> Vec<&WorkflowStep> {
        self.steps
            .iter()
            .filter(|step| {
                step.status == WorkflowStatus::Pending
                    && step.dependencies.iter().all(|dep| completed.contains(dep))
            })
            .collect()
    }

    /// Validate the step graph: dependency references must point at steps in
    /// this workflow and the graph must be acyclic (Kahn's algorithm).
    pub fn validate(&self) -> Result<(), WorkflowParseError> {
        let ids: HashSet<Uuid> = self.steps.iter().map(|s| s.id).collect();
        for step in &self.steps {
            for dep in &step.dependencies {
                if !ids.contains(dep) {
                    return Err(WorkflowParseError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }
        self.check_for_cycles()
    }

    /// Detect dependency cycles via topological sort.
    fn check_for_cycles(&self) -> Result<(), WorkflowParseError> {
        let index: HashMap<Uuid, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| (step.id, i))
            .collect();

        let n = self.steps.len();
        let mut in_degree = vec![0usize; n];
        let mut adj: Vec<Vec<usize>> = vec![vec![]; n];

        for (step_idx, step) in self.steps.iter().enumerate() {
            for dep in &step.dependencies {
                let dep_idx = index[dep];
                // Edge: dep -> step (dep must complete before step).
                adj[dep_idx].push(step_idx);
                in_degree[step_idx] += 1;
            }
        }

        let mut queue: VecDeque<usize> = VecDeque::new();
        for (i, deg) in in_degree.iter().enumerate() {
            if *deg == 0 {
                queue.push_back(i);
            }
        }

        let mut sorted_count = 0usize;
        while let Some(node) = queue.pop_front() {
            sorted_count += 1;
            for &neighbor in &adj[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }

        if sorted_count != n {
            let cycle_steps: Vec<&str> = in_degree
                .iter()
                .enumerate()
                .filter(|(_, deg)| **deg > 0)
                .map(|(i, _)| self.steps[i].name.as_str())
                .collect();
            return Err(WorkflowParseError::CycleDetected(cycle_steps.join(", ")));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
