//! Workflow TOML parser with validation.
//!
//! Parses a `workflow.toml` string into a [`Workflow`] and validates:
//! - Step type values are valid enum variants.
//! - Step names are unique.
//! - `depends_on` references point to existing step names.
//! - The dependency graph is acyclic (topological sort).

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use super::format::WorkflowDoc;
use super::{StepType, Workflow};

/// Errors that can occur during workflow parsing and validation.
#[derive(Debug, Error)]
pub enum WorkflowParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("duplicate step name: {0:?}")]
    DuplicateStepName(String),

    #[error("step {step:?} depends on unknown step {dependency:?}")]
    UnknownDependency { step: String, dependency: String },

    #[error("invalid step type {value:?} on step {step:?}")]
    InvalidStepType { step: String, value: String },

    #[error("dependency cycle detected involving steps: {0}")]
    CycleDetected(String),

    #[error("workflow must contain at least one step")]
    NoSteps,
}

/// Parse and validate a `workflow.toml` string.
///
/// Returns a validated [`Workflow`] or a descriptive error.
pub fn parse_workflow_toml(content: &str) -> Result<Workflow, WorkflowParseError> {
    let doc: WorkflowDoc = toml::from_str(content)?;
    Workflow::from_doc(doc)
}

/// Validate a parsed workflow document.
pub(super) fn validate_doc(doc: &WorkflowDoc) -> Result<(), WorkflowParseError> {
    if doc.steps.is_empty() {
        return Err(WorkflowParseError::NoSteps);
    }

    // Collect step names and check for duplicates.
    let mut seen = HashSet::new();
    for step in &doc.steps {
        if !seen.insert(&step.name) {
            return Err(WorkflowParseError::DuplicateStepName(step.name.clone()));
        }
    }

    // Validate step types and dependency references.
    for step in &doc.steps {
        if step.step_type.parse::<StepType>().is_err() {
            return Err(WorkflowParseError::InvalidStepType {
                step: step.name.clone(),
                value: step.step_type.clone(),
            });
        }

        for dep in &step.depends_on {
            if !seen.contains(dep) {
                return Err(WorkflowParseError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    check_for_cycles(doc)
}

/// Detect dependency cycles using Kahn's algorithm for topological sort.
fn check_for_cycles(doc: &WorkflowDoc) -> Result<(), WorkflowParseError> {
    let step_names: Vec<&str> = doc.steps.iter().map(|s| s.name.as_str()).collect();
    let name_to_idx: HashMap<&str, usize> = step_names
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i))
        .collect();

    let n = step_names.len();
    let mut in_degree = vec![0usize; n];
    let mut adj: Vec<Vec<usize>> = vec![vec![]; n];

    for step in &doc.steps {
        let step_idx = name_to_idx[step.name.as_str()];
        for dep_name in &step.depends_on {
            let dep_idx = name_to_idx[dep_name.as_str()];
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
            .map(|(i, _)| step_names[i])
            .collect();
        return Err(WorkflowParseError::CycleDetected(cycle_steps.join(", ")));
    }

    Ok(())
}
