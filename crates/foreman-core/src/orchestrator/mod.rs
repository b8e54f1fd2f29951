//! The orchestrator facade: task submission and routing, the main
//! processing loop, conversations, and lifecycle management.
//!
//! One orchestrator owns one task queue, one agent registry, one
//! conversation manager, and one correction loop. Methods take `&mut self`;
//! callers that share an orchestrator across tasks wrap it in an async
//! mutex, which serializes mutations per instance.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::{Agent, AgentMessage, AgentRegistry, AgentResponse};
use crate::conversation::{ConversationManager, ConversationMode, ConversationTurn};
use crate::correction::CorrectionLoop;
use crate::error::OrchestratorError;
use crate::task::{Task, TaskQueue, TaskResult, TaskStatus};

// ---------------------------------------------------------------------------
// Config and status
// ---------------------------------------------------------------------------

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub name: String,
    pub max_concurrent_tasks: usize,
    pub max_conversation_turns: usize,
    pub enable_correction_loops: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: "foreman".to_string(),
            max_concurrent_tasks: 5,
            max_conversation_turns: 50,
            enable_correction_loops: true,
        }
    }
}

/// Point-in-time snapshot of orchestrator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub name: String,
    pub is_running: bool,
    pub agents_count: usize,
    pub agents: Vec<String>,
    pub pending_tasks: usize,
    pub active_conversations: usize,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Coordinates agents, tasks, conversations, and correction.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: AgentRegistry,
    queue: TaskQueue,
    conversations: ConversationManager,
    correction_loop: CorrectionLoop,
    cancel: CancellationToken,
    is_running: bool,
}

impl Orchestrator {
    /// Create an orchestrator with the given configuration.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            registry: AgentRegistry::new(),
            queue: TaskQueue::new(),
            conversations: ConversationManager::new(),
            correction_loop: CorrectionLoop::default_loop(),
            cancel: CancellationToken::new(),
            is_running: false,
        }
    }

    /// The orchestrator configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The task queue.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// The agent registry.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// The correction loop, for evaluator and handler registration.
    pub fn correction_loop_mut(&mut self) -> &mut CorrectionLoop {
        &mut self.correction_loop
    }

    /// Replace the correction loop (e.g. with a strict or lenient preset).
    pub fn set_correction_loop(&mut self, correction_loop: CorrectionLoop) {
        self.correction_loop = correction_loop;
    }

    /// Whether the processing loop is running.
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    /// Register an agent and run its `initialize` lifecycle hook.
    pub async fn register_agent(&mut self, agent: Arc<dyn Agent>) -> Result<()> {
        agent
            .initialize()
            .await
            .with_context(|| format!("failed to initialize agent {:?}", agent.name()))?;
        tracing::info!(agent = %agent.name(), "agent registered");
        self.registry.register(agent);
        Ok(())
    }

    /// Unregister an agent and run its `shutdown` lifecycle hook.
    pub async fn unregister_agent(&mut self, name: &str) -> Result<()> {
        if let Some(agent) = self.registry.unregister(name) {
            agent
                .shutdown()
                .await
                .with_context(|| format!("failed to shut down agent {name:?}"))?;
            tracing::info!(agent = %name, "agent unregistered");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Submit a task for processing. Returns the task id.
    pub fn submit_task(&mut self, task: Task) -> Uuid {
        let id = task.id;
        tracing::debug!(task_id = %id, task_type = %task.task_type, "task submitted");
        self.queue.add(task);
        id
    }

    /// Administratively cancel a task. A cancelled task never retries.
    pub fn cancel_task(&mut self, task_id: Uuid) -> bool {
        self.queue.cancel(task_id)
    }

    /// Process a single task: route it to an agent, invoke the handler, and
    /// run the correction loop when the response asks for it.
    ///
    /// The task is mutated in place (assigned agent, status, correction
    /// counter); queue-resident copies are reconciled by the caller, which
    /// for the main loop is [`Self::run_task_loop`].
    pub async fn process_task(&mut self, task: &mut Task) -> TaskResult {
        let candidates = self.registry.agents_for_task(task);
        let Some(agent) = candidates.first().cloned() else {
            let error = OrchestratorError::NoSuitableAgent {
                task_type: task.task_type,
            };
            tracing::warn!(task_id = %task.id, task_type = %task.task_type, "no suitable agent");
            let mut result = TaskResult::failure(error.to_string());
            result.retryable = false;
            result
                .metadata
                .insert("error_kind".to_string(), Value::String(error.kind().into()));
            return result;
        };

        task.assigned_agent = Some(agent.name().to_string());
        task.update_status(TaskStatus::InProgress);
        tracing::info!(task_id = %task.id, agent = %agent.name(), "task dispatched");

        let response = match agent.handle_task(task).await {
            Ok(response) => response,
            Err(e) => {
                let error = OrchestratorError::AgentFailure {
                    agent: agent.name().to_string(),
                    message: e.to_string(),
                    retryable: true,
                };
                let mut result = TaskResult::failure(error.to_string());
                result
                    .metadata
                    .insert("error_kind".to_string(), Value::String(error.kind().into()));
                return result;
            }
        };

        if self.config.enable_correction_loops && response.needs_correction {
            return self.run_correction(task, &response).await;
        }

        TaskResult {
            success: response.success,
            output: Value::String(response.content.clone()),
            artifacts: response.artifacts,
            error_message: if response.success {
                None
            } else {
                Some(response.content)
            },
            execution_time_ms: 0.0,
            metadata: HashMap::new(),
            retryable: true,
        }
    }

    /// Run the correction loop over an agent response.
    async fn run_correction(&mut self, task: &mut Task, response: &AgentResponse) -> TaskResult {
        let mut context = HashMap::new();
        context.insert(
            "task".to_string(),
            serde_json::to_value(&*task).unwrap_or(Value::Null),
        );
        context.insert(
            "agent".to_string(),
            Value::String(response.agent_name.clone()),
        );

        let outcome = match self
            .correction_loop
            .run(task, Value::String(response.content.clone()), &context)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                return TaskResult::failure(format!("correction loop error: {e}"));
            }
        };

        let mut result = if outcome.success {
            TaskResult::success(outcome.final_output.clone())
        } else {
            let error = OrchestratorError::CorrectionExhausted {
                iterations: outcome.total_iterations,
            };
            let mut failed = TaskResult::failure(error.to_string());
            failed.retryable = false;
            failed.output = outcome.final_output.clone();
            failed
                .metadata
                .insert("error_kind".to_string(), Value::String(error.kind().into()));
            failed
        };
        result.metadata.insert(
            "correction_iterations".to_string(),
            Value::from(outcome.total_iterations),
        );
        result.metadata.insert(
            "correction_status".to_string(),
            Value::String(outcome.status.to_string()),
        );
        result
    }

    /// Drain the queue: reset elapsed retries, then repeatedly pull the
    /// next ready task and process it until the queue is exhausted or the
    /// orchestrator is stopped.
    pub async fn run_task_loop(&mut self) {
        self.is_running = true;

        while !self.cancel.is_cancelled() {
            self.queue.process_retries();

            let Some(snapshot) = self.queue.pop_next() else {
                break;
            };
            self.queue.update_status(snapshot.id, TaskStatus::Queued);

            let mut task = snapshot;
            task.update_status(TaskStatus::Queued);
            let result = self.process_task(&mut task).await;
            let task_id = task.id;
            let already_failed = task.status == TaskStatus::Failed;
            self.queue.replace(task);
            self.queue.set_result(task_id, result.clone());

            if result.success {
                self.queue.mark_completed(task_id);
            } else if already_failed || !result.retryable {
                // Correction exhaustion and routing failures are terminal.
                self.queue.update_status(task_id, TaskStatus::Failed);
            } else {
                self.queue
                    .mark_failed(task_id, result.error_message.as_deref());
            }
        }

        self.is_running = false;
    }

    /// Signal the processing loop to stop at the next iteration boundary.
    pub fn stop(&mut self) {
        self.cancel.cancel();
    }

    // -----------------------------------------------------------------------
    // Conversations
    // -----------------------------------------------------------------------

    /// Create a conversation among registered agents.
    ///
    /// Unregistered participant names are dropped.
    pub fn create_conversation(
        &mut self,
        topic: impl Into<String>,
        participant_names: Vec<String>,
        mode: ConversationMode,
        task_id: Option<Uuid>,
    ) -> Uuid {
        let participants: Vec<String> = participant_names
            .into_iter()
            .filter(|name| self.registry.contains(name))
            .collect();
        self.conversations.create(topic, participants, mode, task_id)
    }

    /// Send a message within a conversation and append the turn.
    ///
    /// Returns `None` if the conversation is missing or inactive, or if the
    /// recipient is not a registered agent.
    pub async fn send_message(
        &mut self,
        conversation_id: Uuid,
        sender: &str,
        recipient: &str,
        content: &str,
    ) -> Option<AgentResponse> {
        let active = self
            .conversations
            .get(conversation_id)
            .is_some_and(|c| c.is_active());
        if !active {
            return None;
        }
        let agent = self.registry.get(recipient).cloned()?;

        let mut message = AgentMessage::new(sender, recipient, content);
        message.metadata.insert(
            "conversation_id".to_string(),
            Value::String(conversation_id.to_string()),
        );

        let response = match agent.process_message(message.clone()).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    recipient = %recipient,
                    error = %e,
                    "message processing failed"
                );
                return None;
            }
        };

        if let Some(conversation) = self.conversations.get_mut(conversation_id) {
            conversation.add_turn(ConversationTurn {
                speaker: sender.to_string(),
                message,
                response: Some(response.clone()),
                timestamp: chrono::Utc::now(),
            });
        }

        Some(response)
    }

    /// Broadcast a message to every participant except the sender.
    ///
    /// Returns the successful responses in participant order. An inactive
    /// or unknown conversation degrades to an empty list.
    pub async fn broadcast_message(
        &mut self,
        conversation_id: Uuid,
        sender: &str,
        content: &str,
    ) -> Vec<AgentResponse> {
        let participants: Vec<String> = match self.conversations.get(conversation_id) {
            Some(conversation) if conversation.is_active() => {
                conversation.participants.clone()
            }
            _ => return Vec::new(),
        };

        let mut responses = Vec::new();
        for participant in participants {
            if participant == sender {
                continue;
            }
            if let Some(response) = self
                .send_message(conversation_id, sender, &participant, content)
                .await
            {
                responses.push(response);
            }
        }
        responses
    }

    /// End a conversation.
    pub fn end_conversation(&mut self, conversation_id: Uuid) {
        self.conversations.end(conversation_id);
    }

    /// The conversation manager.
    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the orchestrator. Agents are initialized at registration; this
    /// arms the processing loop.
    pub fn start(&mut self) {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.is_running = true;
        tracing::info!(name = %self.config.name, "orchestrator started");
    }

    /// Shut down: stop the loop and run every agent's `shutdown` hook.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.is_running = false;
        for agent in self.registry.all() {
            if let Err(e) = agent.shutdown().await {
                tracing::warn!(agent = %agent.name(), error = %e, "agent shutdown failed");
            }
        }
        tracing::info!(name = %self.config.name, "orchestrator shut down");
    }

    /// Current status snapshot.
    pub fn get_status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            name: self.config.name.clone(),
            is_running: self.is_running,
            agents_count: self.registry.len(),
            agents: self.registry.names().iter().map(|s| s.to_string()).collect(),
            pending_tasks: self.queue.tasks_by_status(TaskStatus::Pending).len(),
            active_conversations: self.conversations.active().len(),
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("name", &self.config.name)
            .field("is_running", &self.is_running)
            .field("agents", &self.registry.names())
            .field("tasks", &self.queue.len())
            .finish()
    }
}
