//! Reusable task templates with `${var}` substitution.
//!
//! Templates are immutable patterns for common work items. The built-in
//! library is defined in `templates.toml` and embedded in the binary at
//! compile time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RetryConfig, Task, TaskPriority, TaskType};

/// An immutable task pattern.
///
/// `description_template` and string values in `metadata_template` may
/// contain `${name}` placeholders, filled from the template's default
/// variables merged with caller-provided ones (caller values win).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    pub description_template: String,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub retry_config: Option<RetryConfig>,
    #[serde(default = "default_max_corrections")]
    pub max_corrections: u32,
    #[serde(default)]
    pub metadata_template: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_max_corrections() -> u32 {
    3
}

impl TaskTemplate {
    /// Instantiate a task from this template.
    ///
    /// Caller variables override the template defaults. The resulting
    /// task's metadata records `template_name` and `template_variables`.
    pub fn create_task(&self, title: impl Into<String>, variables: Option<&HashMap<String, String>>) -> Task {
        let mut merged = self.variables.clone();
        if let Some(overrides) = variables {
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
        }

        let description = substitute_variables(&self.description_template, &merged);

        let mut task = Task::new(title, description, self.task_type, self.priority);
        task.max_corrections = self.max_corrections;
        if let Some(retry_config) = &self.retry_config {
            task.retry_config = retry_config.clone();
        }

        for (key, value) in &self.metadata_template {
            task.metadata.insert(
                key.clone(),
                Value::String(substitute_variables(value, &merged)),
            );
        }
        task.metadata.insert(
            "template_name".to_string(),
            Value::String(self.name.clone()),
        );
        task.metadata.insert(
            "template_variables".to_string(),
            Value::Object(
                merged
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        );

        task
    }
}

/// Replace every `${name}` placeholder with the matching variable value.
/// Unknown placeholders are left in place.
fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = template.to_owned();
    for (key, value) in variables {
        let placeholder = format!("${{{key}}}");
        result = result.replace(&placeholder, value);
    }
    result
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

/// Container for deserializing the embedded TOML file.
#[derive(Debug, Deserialize)]
struct TemplateFile {
    templates: Vec<TaskTemplate>,
}

/// The embedded built-in templates TOML.
static TEMPLATES_TOML: &str = include_str!("templates.toml");

/// A name-keyed collection of task templates.
#[derive(Debug, Default)]
pub struct TemplateLibrary {
    templates: HashMap<String, TaskTemplate>,
    order: Vec<String>,
}

impl TemplateLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the built-in template library embedded in the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed. If the binary was built,
    /// the TOML is valid.
    pub fn builtin() -> Self {
        let file: TemplateFile =
            toml::from_str(TEMPLATES_TOML).expect("embedded templates.toml is invalid");
        let mut library = Self::new();
        for template in file.templates {
            library.add(template);
        }
        library
    }

    /// Add a template, replacing any existing one with the same name.
    pub fn add(&mut self, template: TaskTemplate) {
        if !self.templates.contains_key(&template.name) {
            self.order.push(template.name.clone());
        }
        self.templates.insert(template.name.clone(), template);
    }

    /// Look up a template by name.
    pub fn get(&self, name: &str) -> Option<&TaskTemplate> {
        self.templates.get(name)
    }

    /// Remove a template. Returns `true` if it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.order.retain(|n| n != name);
        self.templates.remove(name).is_some()
    }

    /// Template names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Templates carrying the given tag.
    pub fn by_tag(&self, tag: &str) -> Vec<&TaskTemplate> {
        self.order
            .iter()
            .filter_map(|name| self.templates.get(name))
            .filter(|t| t.tags.iter().any(|candidate| candidate == tag))
            .collect()
    }

    /// Templates for a given task type.
    pub fn by_type(&self, task_type: TaskType) -> Vec<&TaskTemplate> {
        self.order
            .iter()
            .filter_map(|name| self.templates.get(name))
            .filter(|t| t.task_type == task_type)
            .collect()
    }

    /// Instantiate a task from a named template, or `None` if unknown.
    pub fn create_task(
        &self,
        template_name: &str,
        title: impl Into<String>,
        variables: Option<&HashMap<String, String>>,
    ) -> Option<Task> {
        self.get(template_name)
            .map(|template| template.create_task(title, variables))
    }

    /// Number of templates in the library.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Return `true` if the library is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
