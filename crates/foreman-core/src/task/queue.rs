//! Priority- and dependency-ordered task queue.
//!
//! The queue is pull-based: callers decide when to take work via
//! [`TaskQueue::pop_next`], which returns the highest-priority pending task
//! whose dependencies are all completed. Failures route through
//! [`TaskQueue::mark_failed`], which consults the task's retry policy and
//! either schedules a retry or fails the task terminally.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use uuid::Uuid;

use super::{Task, TaskResult, TaskStatus};

/// In-process task queue with priority and dependency scheduling.
///
/// Reads hand out snapshots; mutations go through id-keyed methods so the
/// queue remains the single owner of task state.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: HashMap<Uuid, Task>,
    completed: HashSet<Uuid>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task to the queue.
    pub fn add(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    /// Get a task by id.
    pub fn get(&self, task_id: Uuid) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    /// Write back a mutated copy of a task previously read from the queue.
    pub fn replace(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    /// The set of completed task ids.
    pub fn completed_ids(&self) -> &HashSet<Uuid> {
        &self.completed
    }

    /// Return a snapshot of the next task ready to be processed, or `None`.
    ///
    /// Among pending tasks whose dependencies are all completed, picks the
    /// highest priority (critical > high > medium > low), breaking ties by
    /// earliest creation time. Does not mutate status; the caller decides
    /// when to advance it.
    pub fn pop_next(&self) -> Option<Task> {
        self.tasks
            .values()
            .filter(|task| {
                task.status == TaskStatus::Pending && task.can_start(&self.completed)
            })
            .min_by_key(|task| (task.priority.rank(), task.created_at))
            .cloned()
    }

    /// Mark a task as completed and add it to the completed set.
    pub fn mark_completed(&mut self, task_id: Uuid) {
        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.update_status(TaskStatus::Completed);
            self.completed.insert(task_id);
        }
    }

    /// Mark a task as failed and decide retry versus terminal failure.
    ///
    /// Returns `true` if a retry was scheduled, `false` if the task is now
    /// permanently failed (or unknown). A cancelled task never retries.
    pub fn mark_failed(&mut self, task_id: Uuid, error_message: Option<&str>) -> bool {
        let Some(task) = self.tasks.get_mut(&task_id) else {
            return false;
        };
        if task.status == TaskStatus::Cancelled {
            return false;
        }

        task.record_failure(error_message);
        let retrying = task.status == TaskStatus::Retrying;
        if retrying {
            tracing::info!(
                task_id = %task_id,
                attempt = task.retry_state.attempt,
                next_retry_at = ?task.retry_state.next_retry_at,
                "task failed, retry scheduled"
            );
        } else {
            tracing::warn!(
                task_id = %task_id,
                attempts = task.retry_state.attempt,
                "task failed permanently"
            );
        }
        retrying
    }

    /// Administrative cancel. Returns `false` for unknown or terminal tasks.
    pub fn cancel(&mut self, task_id: Uuid) -> bool {
        match self.tasks.get_mut(&task_id) {
            Some(task) if !task.is_terminal() => {
                task.update_status(TaskStatus::Cancelled);
                true
            }
            _ => false,
        }
    }

    /// Update a task's status. Returns `false` for unknown tasks.
    pub fn update_status(&mut self, task_id: Uuid, status: TaskStatus) -> bool {
        match self.tasks.get_mut(&task_id) {
            Some(task) => {
                task.update_status(status);
                true
            }
            None => false,
        }
    }

    /// Store a terminal result on a task.
    pub fn set_result(&mut self, task_id: Uuid, result: TaskResult) {
        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.result = Some(result);
            task.updated_at = Utc::now();
        }
    }

    /// Tasks whose retry delay has elapsed.
    pub fn ready_for_retry(&self) -> Vec<&Task> {
        let now = Utc::now();
        self.tasks
            .values()
            .filter(|task| {
                task.status == TaskStatus::Retrying
                    && task
                        .retry_state
                        .next_retry_at
                        .is_some_and(|at| at <= now)
            })
            .collect()
    }

    /// Reset tasks whose retry delay has elapsed back to pending.
    ///
    /// Returns the ids that were reset.
    pub fn process_retries(&mut self) -> Vec<Uuid> {
        let ready: Vec<Uuid> = self.ready_for_retry().iter().map(|task| task.id).collect();
        for task_id in &ready {
            if let Some(task) = self.tasks.get_mut(task_id) {
                task.reset_for_retry();
            }
        }
        ready
    }

    /// All tasks with the given status.
    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.status == status)
            .collect()
    }

    /// All permanently failed tasks.
    pub fn failed_tasks(&self) -> Vec<&Task> {
        self.tasks_by_status(TaskStatus::Failed)
    }

    /// All tasks waiting for retry.
    pub fn retrying_tasks(&self) -> Vec<&Task> {
        self.tasks_by_status(TaskStatus::Retrying)
    }

    /// All tasks in the queue.
    pub fn all_tasks(&self) -> Vec<&Task> {
        self.tasks.values().collect()
    }

    /// Number of tasks in the queue (any status).
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Return `true` if the queue holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
