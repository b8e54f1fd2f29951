//! Iterative correction: evaluate, correct, re-evaluate until the output
//! passes or the iteration cap is reached.
//!
//! Correction handlers are registered per finding category; during a
//! correction pass every error- or critical-severity finding is offered to
//! its category handler, which may rewrite the current output.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::evaluate::{combine, EvaluationResult, Evaluator, Severity};
use crate::task::{Task, TaskStatus};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status of a correction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    Pending,
    Evaluating,
    Correcting,
    Completed,
    MaxIterationsReached,
    Failed,
}

impl fmt::Display for CorrectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Evaluating => "evaluating",
            Self::Correcting => "correcting",
            Self::Completed => "completed",
            Self::MaxIterationsReached => "max_iterations_reached",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for CorrectionStatus {
    type Err = CorrectionStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "evaluating" => Ok(Self::Evaluating),
            "correcting" => Ok(Self::Correcting),
            "completed" => Ok(Self::Completed),
            "max_iterations_reached" => Ok(Self::MaxIterationsReached),
            "failed" => Ok(Self::Failed),
            other => Err(CorrectionStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`CorrectionStatus`] string.
#[derive(Debug, Clone)]
pub struct CorrectionStatusParseError(pub String);

impl fmt::Display for CorrectionStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid correction status: {:?}", self.0)
    }
}

impl std::error::Error for CorrectionStatusParseError {}

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// A single iteration in a correction loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionIteration {
    pub iteration: u32,
    pub evaluation: EvaluationResult,
    #[serde(default)]
    pub correction_applied: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result of running a correction loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    pub success: bool,
    pub final_output: Value,
    pub iterations: Vec<CorrectionIteration>,
    pub total_iterations: u32,
    pub status: CorrectionStatus,
}

/// A correction handler for one finding category.
///
/// Receives the current output and the combined evaluation; returning
/// `Some` replaces the current output.
pub type CorrectionHandler =
    Box<dyn Fn(&Value, &EvaluationResult) -> Option<Value> + Send + Sync>;

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// The bounded evaluate-correct-re-evaluate loop.
pub struct CorrectionLoop {
    evaluators: Vec<Arc<dyn Evaluator>>,
    max_iterations: u32,
    min_passing_score: f64,
    handlers: HashMap<String, CorrectionHandler>,
}

impl CorrectionLoop {
    /// Create a loop with explicit bounds.
    pub fn new(max_iterations: u32, min_passing_score: f64) -> Self {
        Self {
            evaluators: Vec::new(),
            max_iterations,
            min_passing_score,
            handlers: HashMap::new(),
        }
    }

    /// Default preset: 3 iterations, minimum passing score 0.8.
    pub fn default_loop() -> Self {
        Self::new(3, 0.8)
    }

    /// Strict preset: 5 iterations, minimum passing score 0.95.
    pub fn strict_loop() -> Self {
        Self::new(5, 0.95)
    }

    /// Lenient preset: 2 iterations, minimum passing score 0.6.
    pub fn lenient_loop() -> Self {
        Self::new(2, 0.6)
    }

    /// The configured iteration cap.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Add an evaluator; evaluation order follows insertion order.
    pub fn add_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) {
        self.evaluators.push(evaluator);
    }

    /// Register a correction handler for a finding category.
    pub fn register_handler(&mut self, category: impl Into<String>, handler: CorrectionHandler) {
        self.handlers.insert(category.into(), handler);
    }

    /// Run the loop on a task's output.
    ///
    /// Each iteration evaluates the current output with every registered
    /// evaluator, combines the verdicts, and either stops (pass, or nothing
    /// left to correct) or applies category handlers and tries again. The
    /// pass check runs before the cap is consulted, so an output that passes
    /// on the final iteration still completes successfully.
    pub async fn run(
        &self,
        task: &mut Task,
        initial_output: Value,
        context: &HashMap<String, Value>,
    ) -> Result<CorrectionOutcome> {
        let mut current_output = initial_output;
        let mut iterations: Vec<CorrectionIteration> = Vec::new();

        for iteration_num in 1..=self.max_iterations {
            let mut results = Vec::with_capacity(self.evaluators.len());
            for evaluator in &self.evaluators {
                results.push(evaluator.evaluate(&current_output, context).await?);
            }
            let combined = combine(&results);

            tracing::debug!(
                task_id = %task.id,
                iteration = iteration_num,
                passed = combined.passed,
                score = combined.score,
                "correction loop evaluated output"
            );

            let mut iteration = CorrectionIteration {
                iteration: iteration_num,
                evaluation: combined.clone(),
                correction_applied: None,
                timestamp: Utc::now(),
            };

            if combined.passed && combined.score >= self.min_passing_score {
                iterations.push(iteration);
                return Ok(CorrectionOutcome {
                    success: true,
                    final_output: current_output,
                    total_iterations: iteration_num,
                    iterations,
                    status: CorrectionStatus::Completed,
                });
            }

            if !combined.needs_correction {
                // Nothing left to correct; report what we have.
                let success = combined.passed;
                iterations.push(iteration);
                return Ok(CorrectionOutcome {
                    success,
                    final_output: current_output,
                    total_iterations: iteration_num,
                    iterations,
                    status: CorrectionStatus::Completed,
                });
            }

            let (corrected, description) = self.apply_corrections(&current_output, &combined);
            if let Some(new_output) = corrected {
                current_output = new_output;
            }
            iteration.correction_applied = Some(description);
            iterations.push(iteration);

            task.correction_count += 1;
            task.update_status(TaskStatus::NeedsCorrection);
        }

        // Cap expired without a pass.
        task.update_status(TaskStatus::Failed);
        Ok(CorrectionOutcome {
            success: false,
            final_output: current_output,
            total_iterations: self.max_iterations,
            iterations,
            status: CorrectionStatus::MaxIterationsReached,
        })
    }

    /// Apply registered handlers to error- and critical-severity findings.
    ///
    /// Returns the (possibly rewritten) output and a description of what was
    /// applied.
    fn apply_corrections(
        &self,
        output: &Value,
        evaluation: &EvaluationResult,
    ) -> (Option<Value>, String) {
        let mut current: Option<Value> = None;
        let mut applied: Vec<String> = Vec::new();

        for finding in &evaluation.findings {
            if finding.severity < Severity::Error {
                continue;
            }
            if let Some(handler) = self.handlers.get(&finding.category) {
                let input = current.as_ref().unwrap_or(output);
                if let Some(rewritten) = handler(input, evaluation) {
                    current = Some(rewritten);
                }
                applied.push(format!(
                    "Applied correction for {}: {}",
                    finding.category, finding.message
                ));
            }
        }

        if applied.is_empty() {
            applied.push("No automatic corrections available".to_string());
        }

        (current, applied.join("; "))
    }
}

impl fmt::Debug for CorrectionLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectionLoop")
            .field("evaluators", &self.evaluators.len())
            .field("max_iterations", &self.max_iterations)
            .field("min_passing_score", &self.min_passing_score)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
