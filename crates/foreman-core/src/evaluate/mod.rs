//! The [`Evaluator`] contract and verdict combination.
//!
//! Evaluators score a single output in `[0, 1]` and emit findings. Multiple
//! verdicts combine pessimistically on pass (AND) but averaged on score, so
//! one low finding does not permanently doom a good artifact.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity levels for evaluation findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = SeverityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            other => Err(SeverityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Severity`] string.
#[derive(Debug, Clone)]
pub struct SeverityParseError(pub String);

impl fmt::Display for SeverityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid severity: {:?}", self.0)
    }
}

impl std::error::Error for SeverityParseError {}

// ---------------------------------------------------------------------------
// Findings and results
// ---------------------------------------------------------------------------

/// A single finding from an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationFinding {
    pub category: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl EvaluationFinding {
    pub fn new(category: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            severity,
            location: None,
            suggestion: None,
            metadata: HashMap::new(),
        }
    }
}

/// The outcome of one evaluator run (or a combination of several).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub evaluator_name: String,
    pub passed: bool,
    /// Quality score in `[0, 1]`.
    pub score: f64,
    #[serde(default)]
    pub findings: Vec<EvaluationFinding>,
    #[serde(default)]
    pub needs_correction: bool,
    #[serde(default)]
    pub correction_suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationResult {
    /// A passing result with a perfect score and no findings.
    pub fn pass(evaluator_name: impl Into<String>) -> Self {
        Self {
            evaluator_name: evaluator_name.into(),
            passed: true,
            score: 1.0,
            findings: Vec::new(),
            needs_correction: false,
            correction_suggestions: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Combine evaluator verdicts into one.
///
/// The combine law: `passed` is the AND of all passed flags, `score` is the
/// arithmetic mean, findings and suggestions are concatenated preserving
/// per-evaluator order, and `needs_correction` is the OR. An empty input
/// combines to a pass with score 1.0.
pub fn combine(results: &[EvaluationResult]) -> EvaluationResult {
    if results.is_empty() {
        return EvaluationResult::pass("combined");
    }

    let score = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;
    let passed = results.iter().all(|r| r.passed);
    let needs_correction = results.iter().any(|r| r.needs_correction);
    let findings = results
        .iter()
        .flat_map(|r| r.findings.iter().cloned())
        .collect();
    let correction_suggestions = results
        .iter()
        .flat_map(|r| r.correction_suggestions.iter().cloned())
        .collect();

    EvaluationResult {
        evaluator_name: "combined".to_string(),
        passed,
        score,
        findings,
        needs_correction,
        correction_suggestions,
        timestamp: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Contract for components that score a single output and emit findings.
///
/// Evaluators are stateless with respect to each other; implementations may
/// hold private memoization.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Name of this evaluator, reported on its results.
    fn name(&self) -> &str;

    /// The criteria this evaluator checks.
    fn criteria(&self) -> Vec<String>;

    /// Evaluate content against the criteria.
    async fn evaluate(
        &self,
        content: &Value,
        context: &HashMap<String, Value>,
    ) -> Result<EvaluationResult>;

    /// Whether a correction loop should be triggered for this result.
    fn should_trigger_correction(&self, result: &EvaluationResult) -> bool {
        result.needs_correction || !result.passed
    }
}

// Compile-time assertion: Evaluator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Evaluator) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, passed: bool, score: f64, needs_correction: bool) -> EvaluationResult {
        EvaluationResult {
            evaluator_name: name.to_string(),
            passed,
            score,
            findings: vec![EvaluationFinding::new(
                name,
                format!("finding from {name}"),
                Severity::Warning,
            )],
            needs_correction,
            correction_suggestions: vec![format!("suggestion from {name}")],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn severity_display_roundtrip() {
        let variants = [
            Severity::Info,
            Severity::Warning,
            Severity::Error,
            Severity::Critical,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: Severity = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn combine_empty_passes() {
        let combined = combine(&[]);
        assert!(combined.passed);
        assert_eq!(combined.score, 1.0);
        assert!(combined.findings.is_empty());
        assert!(!combined.needs_correction);
    }

    #[test]
    fn combine_ands_passed_and_averages_score() {
        let combined = combine(&[
            result("a", true, 1.0, false),
            result("b", false, 0.5, true),
            result("c", true, 0.9, false),
        ]);
        assert!(!combined.passed);
        assert!((combined.score - 0.8).abs() < 1e-9);
        assert!(combined.needs_correction);
    }

    #[test]
    fn combine_concatenates_in_order() {
        let combined = combine(&[
            result("first", true, 1.0, false),
            result("second", true, 1.0, false),
        ]);
        assert_eq!(combined.findings.len(), 2);
        assert_eq!(combined.findings[0].category, "first");
        assert_eq!(combined.findings[1].category, "second");
        assert_eq!(
            combined.correction_suggestions,
            vec!["suggestion from first", "suggestion from second"]
        );
    }

    #[test]
    fn combine_all_passing_stays_passing() {
        let combined = combine(&[
            result("a", true, 0.9, false),
            result("b", true, 0.7, false),
        ]);
        assert!(combined.passed);
        assert!(!combined.needs_correction);
        assert!((combined.score - 0.8).abs() < 1e-9);
    }
}
