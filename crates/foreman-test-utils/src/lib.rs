//! Shared test fixtures for foreman integration tests.
//!
//! Provides scripted agent and evaluator implementations with configurable
//! capabilities, canned responses, failure injection, and call logging, so
//! integration tests across crates don't each grow their own fakes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use foreman_core::evaluate::{EvaluationFinding, EvaluationResult, Evaluator, Severity};
use foreman_core::task::{Artifact, Task, TaskType};
use foreman_core::{Agent, AgentMessage, AgentResponse, Capability};

// ---------------------------------------------------------------------------
// ScriptedAgent
// ---------------------------------------------------------------------------

/// One recorded invocation of a scripted agent.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Task title or message content.
    pub input: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A configurable fake agent.
///
/// By default it handles every task type, echoes the task title, and
/// succeeds. Builder methods restrict the handled types, inject failures,
/// request correction, or add latency.
pub struct ScriptedAgent {
    name: String,
    capabilities: Vec<Capability>,
    handles: Option<Vec<TaskType>>,
    reply: String,
    fail_with: Option<String>,
    needs_correction: Option<String>,
    artifacts: Vec<Artifact>,
    delay: Option<Duration>,
    calls: Mutex<Vec<CallRecord>>,
}

impl ScriptedAgent {
    pub fn new(name: &str, capabilities: Vec<Capability>) -> Self {
        Self {
            name: name.to_string(),
            capabilities,
            handles: None,
            reply: format!("{name} done"),
            fail_with: None,
            needs_correction: None,
            artifacts: Vec::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Restrict the task types `can_handle` accepts.
    pub fn handling(mut self, task_types: Vec<TaskType>) -> Self {
        self.handles = Some(task_types);
        self
    }

    /// Set the response content.
    pub fn replying(mut self, reply: &str) -> Self {
        self.reply = reply.to_string();
        self
    }

    /// Make `handle_task` return an error with this message.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Make responses request correction with this reason.
    pub fn requesting_correction(mut self, reason: &str) -> Self {
        self.needs_correction = Some(reason.to_string());
        self
    }

    /// Attach an artifact to every response.
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Sleep for this long inside every handler invocation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Finish building, wrapping in `Arc<dyn Agent>`.
    pub fn build(self) -> Arc<dyn Agent> {
        Arc::new(self)
    }

    /// Invocations recorded so far.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    /// Number of invocations recorded so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn record(&self, input: &str) {
        let started_at = Utc::now();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(CallRecord {
            input: input.to_string(),
            started_at,
            finished_at: Utc::now(),
        });
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted test agent"
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn can_handle(&self, task_type: TaskType) -> bool {
        match &self.handles {
            Some(types) => types.contains(&task_type),
            None => true,
        }
    }

    async fn process_message(&self, message: AgentMessage) -> Result<AgentResponse> {
        self.record(&message.content).await;
        if let Some(error) = &self.fail_with {
            bail!("{error}");
        }
        Ok(AgentResponse::ok(
            &self.name,
            format!("{}: {}", self.reply, message.content),
        ))
    }

    async fn handle_task(&self, task: &Task) -> Result<AgentResponse> {
        self.record(&task.title).await;
        if let Some(error) = &self.fail_with {
            bail!("{error}");
        }
        let mut response = AgentResponse::ok(&self.name, self.reply.clone());
        for artifact in &self.artifacts {
            response = response.with_artifact(artifact.clone());
        }
        if let Some(reason) = &self.needs_correction {
            response.needs_correction = true;
            response.correction_reason = Some(reason.clone());
        }
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// ScriptedEvaluator
// ---------------------------------------------------------------------------

/// A fake evaluator that plays back a scripted sequence of verdicts.
///
/// Each call pops the next verdict; the final one repeats once the script
/// is exhausted.
pub struct ScriptedEvaluator {
    name: String,
    script: Mutex<Vec<EvaluationResult>>,
}

impl ScriptedEvaluator {
    pub fn new(name: &str, script: Vec<EvaluationResult>) -> Arc<Self> {
        assert!(!script.is_empty(), "script must contain at least one verdict");
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(script),
        })
    }

    /// An evaluator that always returns the same verdict.
    pub fn fixed(
        name: &str,
        passed: bool,
        score: f64,
        needs_correction: bool,
    ) -> Arc<Self> {
        Self::new(name, vec![verdict(name, passed, score, needs_correction)])
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn criteria(&self) -> Vec<String> {
        vec!["scripted verdict".to_string()]
    }

    async fn evaluate(
        &self,
        _content: &Value,
        _context: &HashMap<String, Value>,
    ) -> Result<EvaluationResult> {
        let mut script = self.script.lock();
        if script.len() > 1 {
            Ok(script.remove(0))
        } else {
            Ok(script[0].clone())
        }
    }
}

/// Build a verdict with a single finding in the evaluator's name category.
pub fn verdict(
    name: &str,
    passed: bool,
    score: f64,
    needs_correction: bool,
) -> EvaluationResult {
    EvaluationResult {
        evaluator_name: name.to_string(),
        passed,
        score,
        findings: if passed {
            Vec::new()
        } else {
            vec![EvaluationFinding::new(
                name,
                format!("{name} check failed"),
                Severity::Error,
            )]
        },
        needs_correction,
        correction_suggestions: Vec::new(),
        timestamp: Utc::now(),
    }
}
