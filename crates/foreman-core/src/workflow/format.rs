//! Data-only document types for workflow serialization.
//!
//! [`WorkflowDoc`] and [`StepDoc`] map directly to the on-disk
//! `workflow.toml` format (and to JSON). Dependencies are expressed by step
//! name so the files stay hand-authorable; ids are optional and generated
//! when absent. Round-tripping a validated workflow preserves ids, names,
//! step types, configs, dependencies, timeouts, and metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::parser::{validate_doc, WorkflowParseError};
use super::{Workflow, WorkflowStatus, WorkflowStep};

/// Top-level structure of a `workflow.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDoc {
    /// Workflow metadata.
    pub workflow: WorkflowMeta,
    /// Steps within the workflow.
    #[serde(default)]
    pub steps: Vec<StepDoc>,
}

/// Workflow-level metadata in `[workflow]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMeta {
    /// Workflow UUID. Absent in authored files, present after export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Human-readable workflow name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Workflow-level variables, merged with execution inputs.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// A single `[[steps]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDoc {
    /// Step UUID. Absent in authored files, present after export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Unique step name within the workflow (used in `depends_on`).
    pub name: String,
    /// Step type: "task", "agent_action", "conversation", "condition",
    /// "parallel", "loop", "wait", or "approval".
    pub step_type: String,
    /// Configuration mapping; shape depends on the step type.
    #[serde(default)]
    pub config: HashMap<String, Value>,
    /// Names of steps this step depends on (must complete first).
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default = "default_step_max_retries")]
    pub max_retries: u32,
    /// Condition expression for condition-type steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_step_max_retries() -> u32 {
    3
}

impl Workflow {
    /// Export this workflow to a data-only document.
    ///
    /// Execution state (statuses, timestamps, results) is not part of the
    /// document; dependencies are written by step name.
    pub fn to_doc(&self) -> WorkflowDoc {
        let name_of: HashMap<Uuid, &str> = self
            .steps
            .iter()
            .map(|s| (s.id, s.name.as_str()))
            .collect();

        let steps = self
            .steps
            .iter()
            .map(|step| StepDoc {
                id: Some(step.id),
                name: step.name.clone(),
                step_type: step.step_type.to_string(),
                config: step.config.clone(),
                depends_on: step
                    .dependencies
                    .iter()
                    .filter_map(|dep| name_of.get(dep).map(|n| (*n).to_string()))
                    .collect(),
                timeout_seconds: step.timeout_seconds,
                max_retries: step.max_retries,
                condition: step.condition.clone(),
                metadata: step.metadata.clone(),
            })
            .collect();

        WorkflowDoc {
            workflow: WorkflowMeta {
                id: Some(self.id),
                name: self.name.clone(),
                description: self.description.clone(),
                version: self.version.clone(),
                variables: self.variables.clone(),
                metadata: self.metadata.clone(),
            },
            steps,
        }
    }

    /// Build a workflow from a data-only document.
    ///
    /// Validates the document (unique step names, known dependency
    /// references, valid step types, acyclic graph, at least one step) and
    /// resolves name-based dependencies to step ids. Missing ids are
    /// generated.
    pub fn from_doc(doc: WorkflowDoc) -> Result<Self, WorkflowParseError> {
        validate_doc(&doc)?;

        let mut workflow = Workflow::new(doc.workflow.name, doc.workflow.description);
        if let Some(id) = doc.workflow.id {
            workflow.id = id;
        }
        workflow.version = doc.workflow.version;
        workflow.variables = doc.workflow.variables;
        workflow.metadata = doc.workflow.metadata;

        // First pass: assign ids so name-based dependencies can resolve.
        let ids: HashMap<String, Uuid> = doc
            .steps
            .iter()
            .map(|step| (step.name.clone(), step.id.unwrap_or_else(Uuid::new_v4)))
            .collect();

        for step_doc in doc.steps {
            let step_type = step_doc.step_type.parse().map_err(|_| {
                WorkflowParseError::InvalidStepType {
                    step: step_doc.name.clone(),
                    value: step_doc.step_type.clone(),
                }
            })?;
            let mut step = WorkflowStep::new(step_doc.name.clone(), step_type);
            step.id = ids[&step_doc.name];
            step.config = step_doc.config;
            step.dependencies = step_doc
                .depends_on
                .iter()
                .map(|name| ids[name.as_str()])
                .collect();
            step.timeout_seconds = step_doc.timeout_seconds;
            step.max_retries = step_doc.max_retries;
            step.condition = step_doc.condition;
            step.metadata = step_doc.metadata;
            step.status = WorkflowStatus::Pending;
            workflow.add_step(step);
        }

        Ok(workflow)
    }
}
