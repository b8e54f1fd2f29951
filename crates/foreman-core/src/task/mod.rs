//! Task model: the fundamental unit of work agents process.
//!
//! Tasks carry a closed-set type, a priority, dependency links, retry
//! configuration and state, and a correction counter. Status transitions are
//! validated against the lifecycle DAG; entering `in_progress` stamps
//! `started_at` once and entering `completed` stamps `completed_at`.

pub mod queue;
pub mod retry;
pub mod template;

pub use queue::TaskQueue;
pub use retry::{RetryConfig, RetryState, RetryStrategy};
pub use template::{TaskTemplate, TemplateLibrary};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a task in the orchestration system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    InProgress,
    UnderReview,
    NeedsCorrection,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::UnderReview => "under_review",
            Self::NeedsCorrection => "needs_correction",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "under_review" => Ok(Self::UnderReview),
            "needs_correction" => Ok(Self::NeedsCorrection),
            "retrying" => Ok(Self::Retrying),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------

/// Priority levels for tasks. Higher priorities are scheduled first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// Scheduling rank: lower rank pops first (critical = 0, low = 3).
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskPriority {
    type Err = TaskPriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(TaskPriorityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskPriority`] string.
#[derive(Debug, Clone)]
pub struct TaskPriorityParseError(pub String);

impl fmt::Display for TaskPriorityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task priority: {:?}", self.0)
    }
}

impl std::error::Error for TaskPriorityParseError {}

// ---------------------------------------------------------------------------

/// Types of tasks that can be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Planning,
    Development,
    Testing,
    SecurityReview,
    Documentation,
    CodeReview,
    BugFix,
    Feature,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::Development => "development",
            Self::Testing => "testing",
            Self::SecurityReview => "security_review",
            Self::Documentation => "documentation",
            Self::CodeReview => "code_review",
            Self::BugFix => "bug_fix",
            Self::Feature => "feature",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskType {
    type Err = TaskTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "development" => Ok(Self::Development),
            "testing" => Ok(Self::Testing),
            "security_review" => Ok(Self::SecurityReview),
            "documentation" => Ok(Self::Documentation),
            "code_review" => Ok(Self::CodeReview),
            "bug_fix" => Ok(Self::BugFix),
            "feature" => Ok(Self::Feature),
            other => Err(TaskTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskType`] string.
#[derive(Debug, Clone)]
pub struct TaskTypeParseError(pub String);

impl fmt::Display for TaskTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task type: {:?}", self.0)
    }
}

impl std::error::Error for TaskTypeParseError {}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A typed record produced by an agent as part of a task result.
///
/// The core treats `data` as opaque and propagates it; consumers match on
/// `kind` ("code", "test_results", "security_findings", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl Artifact {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

/// Result of task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub execution_time_ms: f64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Whether a failure is eligible for retry.
    #[serde(default = "default_retryable")]
    pub retryable: bool,
}

fn default_retryable() -> bool {
    true
}

impl TaskResult {
    /// A successful result with the given output payload.
    pub fn success(output: Value) -> Self {
        Self {
            success: true,
            output,
            artifacts: Vec::new(),
            error_message: None,
            execution_time_ms: 0.0,
            metadata: HashMap::new(),
            retryable: true,
        }
    }

    /// A failed result with a human-readable error message.
    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            artifacts: Vec::new(),
            error_message: Some(error_message.into()),
            execution_time_ms: 0.0,
            metadata: HashMap::new(),
            retryable: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of work in the orchestration system.
///
/// Tasks support hierarchical decomposition (parent/subtask links),
/// dependency ordering, retry with backoff, and bounded correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    #[serde(default)]
    pub parent_task_id: Option<Uuid>,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    #[serde(default)]
    pub subtasks: Vec<Uuid>,
    #[serde(default)]
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_config: RetryConfig,
    #[serde(default)]
    pub retry_state: RetryState,
    #[serde(default)]
    pub correction_count: u32,
    #[serde(default = "default_max_corrections")]
    pub max_corrections: u32,
    #[serde(default)]
    pub result: Option<TaskResult>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

fn default_max_corrections() -> u32 {
    3
}

impl Task {
    /// Create a new pending task.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        task_type: TaskType,
        priority: TaskPriority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            task_type,
            priority,
            status: TaskStatus::Pending,
            parent_task_id: None,
            dependencies: Vec::new(),
            subtasks: Vec::new(),
            assigned_agent: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            retry_config: RetryConfig::default(),
            retry_state: RetryState::default(),
            correction_count: 0,
            max_corrections: default_max_corrections(),
            result: None,
            metadata: HashMap::new(),
        }
    }

    /// Set dependency task ids, consuming and returning the task.
    pub fn with_dependencies(mut self, dependencies: Vec<Uuid>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Set the retry configuration, consuming and returning the task.
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Check whether every dependency id is in the completed set.
    pub fn can_start(&self, completed: &HashSet<Uuid>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }

    /// Check whether the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check whether the task can have more correction attempts.
    pub fn needs_more_corrections(&self) -> bool {
        self.correction_count < self.max_corrections
    }

    /// Check whether the task can be retried under its configuration.
    pub fn can_retry(&self) -> bool {
        self.retry_state.can_retry(&self.retry_config)
    }

    /// Update the task status and timestamps.
    ///
    /// Entering `in_progress` stamps `started_at` once; entering `completed`
    /// stamps `completed_at`.
    pub fn update_status(&mut self, new_status: TaskStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();

        if new_status == TaskStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        } else if new_status == TaskStatus::Completed {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Record a failed execution and prepare for a potential retry.
    ///
    /// Increments the attempt counter and either schedules the next retry
    /// (`status = retrying`, `next_retry_at` set from the backoff policy) or
    /// marks the task permanently failed with the retry history attached to
    /// the result metadata.
    pub fn record_failure(&mut self, error_message: Option<&str>) {
        self.retry_state.record_attempt(error_message);
        self.updated_at = Utc::now();

        if self.can_retry() {
            let delay = self.retry_config.delay(self.retry_state.attempt);
            self.retry_state.next_retry_at =
                Some(Utc::now() + chrono::Duration::milliseconds((delay * 1000.0) as i64));
            self.status = TaskStatus::Retrying;
        } else {
            self.status = TaskStatus::Failed;
            let mut result = TaskResult::failure(error_message.unwrap_or("task failed"));
            result.retryable = false;
            result.metadata.insert(
                "retry_state".to_string(),
                serde_json::to_value(&self.retry_state).unwrap_or(Value::Null),
            );
            self.result = Some(result);
        }
    }

    /// Reset a retrying task back to pending once its delay has elapsed.
    pub fn reset_for_retry(&mut self) {
        if self.status == TaskStatus::Retrying {
            self.status = TaskStatus::Pending;
            self.retry_state.next_retry_at = None;
            self.updated_at = Utc::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_display_roundtrip() {
        let variants = [
            TaskStatus::Pending,
            TaskStatus::Queued,
            TaskStatus::InProgress,
            TaskStatus::UnderReview,
            TaskStatus::NeedsCorrection,
            TaskStatus::Retrying,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: TaskStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn task_status_invalid() {
        let result = "bogus".parse::<TaskStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Retrying.is_terminal());
    }

    #[test]
    fn task_priority_display_roundtrip() {
        let variants = [
            TaskPriority::Low,
            TaskPriority::Medium,
            TaskPriority::High,
            TaskPriority::Critical,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: TaskPriority = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn priority_rank_order() {
        assert!(TaskPriority::Critical.rank() < TaskPriority::High.rank());
        assert!(TaskPriority::High.rank() < TaskPriority::Medium.rank());
        assert!(TaskPriority::Medium.rank() < TaskPriority::Low.rank());
    }

    #[test]
    fn task_type_display_roundtrip() {
        let variants = [
            TaskType::Planning,
            TaskType::Development,
            TaskType::Testing,
            TaskType::SecurityReview,
            TaskType::Documentation,
            TaskType::CodeReview,
            TaskType::BugFix,
            TaskType::Feature,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: TaskType = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn task_type_invalid() {
        let result = "deploy".parse::<TaskType>();
        assert!(result.is_err());
    }

    #[test]
    fn can_start_requires_all_dependencies() {
        let dep_a = Uuid::new_v4();
        let dep_b = Uuid::new_v4();
        let task = Task::new("t", "d", TaskType::Development, TaskPriority::Medium)
            .with_dependencies(vec![dep_a, dep_b]);

        let mut completed = HashSet::new();
        assert!(!task.can_start(&completed));
        completed.insert(dep_a);
        assert!(!task.can_start(&completed));
        completed.insert(dep_b);
        assert!(task.can_start(&completed));
    }

    #[test]
    fn in_progress_stamps_started_at_once() {
        let mut task = Task::new("t", "d", TaskType::Development, TaskPriority::Medium);
        assert!(task.started_at.is_none());

        task.update_status(TaskStatus::InProgress);
        let first = task.started_at.expect("started_at should be set");

        task.update_status(TaskStatus::NeedsCorrection);
        task.update_status(TaskStatus::InProgress);
        assert_eq!(task.started_at, Some(first));
    }

    #[test]
    fn completed_stamps_completed_at() {
        let mut task = Task::new("t", "d", TaskType::Development, TaskPriority::Medium);
        task.update_status(TaskStatus::Completed);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn record_failure_schedules_retry_then_fails_terminally() {
        let mut task = Task::new("t", "d", TaskType::Development, TaskPriority::Medium)
            .with_retry_config(RetryConfig {
                strategy: RetryStrategy::Immediate,
                max_retries: 1,
                ..RetryConfig::default()
            });

        task.record_failure(Some("transient"));
        assert_eq!(task.status, TaskStatus::Retrying);
        assert!(task.retry_state.next_retry_at.is_some());

        task.reset_for_retry();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.retry_state.next_retry_at.is_none());

        task.record_failure(Some("transient again"));
        assert_eq!(task.status, TaskStatus::Failed);
        let result = task.result.as_ref().expect("failed result stored");
        assert!(!result.success);
        assert!(!result.retryable);
        assert!(result.metadata.contains_key("retry_state"));
    }

    #[test]
    fn task_serializes_with_snake_case_discriminators() {
        let task = Task::new("t", "d", TaskType::SecurityReview, TaskPriority::Critical);
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["task_type"], "security_review");
        assert_eq!(json["priority"], "critical");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn task_roundtrips_through_json() {
        let mut task = Task::new("t", "d", TaskType::BugFix, TaskPriority::High);
        task.metadata
            .insert("component".to_string(), Value::String("queue".to_string()));
        let json = serde_json::to_string(&task).expect("serialize");
        let parsed: Task = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.id, task.id);
        assert_eq!(parsed.task_type, task.task_type);
        assert_eq!(parsed.created_at, task.created_at);
        assert_eq!(parsed.metadata["component"], "queue");
    }
}
