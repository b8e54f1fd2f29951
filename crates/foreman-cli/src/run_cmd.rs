//! `foreman validate` and `foreman run`: parse and execute workflow files.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use foreman_agents::default_agents;
use foreman_core::workflow::{parse_workflow_toml, Workflow, WorkflowEngine};

/// Validate a workflow file and report its shape.
pub fn validate(file: &str) -> Result<()> {
    let workflow = load_workflow(file)?;
    println!(
        "workflow {:?} is valid: {} steps, version {}",
        workflow.name,
        workflow.steps.len(),
        workflow.version
    );
    for step in &workflow.steps {
        println!("  {} ({})", step.name, step.step_type);
    }
    Ok(())
}

/// Execute a workflow file with the built-in agents.
pub async fn run(file: &str, max_parallel: usize, inputs: &[String], json: bool) -> Result<()> {
    let mut workflow = load_workflow(file)?;
    let inputs = parse_inputs(inputs)?;

    let mut engine = WorkflowEngine::new().with_max_parallel_steps(max_parallel);
    engine.register_agents(default_agents());

    let result = engine.execute(&mut workflow, Some(inputs)).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "workflow {:?} finished: {} ({:.0} ms)",
            workflow.name, result.status, result.execution_time_ms
        );
        for step in &workflow.steps {
            println!("  {} -> {}", step.name, step.status);
        }
        if let Some(error) = &result.error_message {
            println!("error: {error}");
        }
    }

    if !result.success {
        bail!("workflow {:?} did not complete successfully", workflow.name);
    }
    Ok(())
}

/// Read and parse a workflow TOML file.
fn load_workflow(file: &str) -> Result<Workflow> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read workflow file {file:?}"))?;
    parse_workflow_toml(&contents)
        .with_context(|| format!("failed to parse workflow file {file:?}"))
}

/// Parse `key=value` pairs into workflow input variables.
fn parse_inputs(pairs: &[String]) -> Result<HashMap<String, Value>> {
    let mut inputs = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid input {pair:?}, expected KEY=VALUE");
        };
        // Numbers and booleans are passed through typed; everything else is
        // a string.
        let parsed = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        inputs.insert(key.to_string(), parsed);
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[workflow]
name = "smoke"

[[steps]]
name = "plan"
step_type = "task"

[steps.config]
agent = "planner"
task_type = "planning"
description = "Plan the smoke test"

[[steps]]
name = "build"
step_type = "task"
depends_on = ["plan"]

[steps.config]
agent = "developer"
task_type = "development"
description = "Implement the smoke test"
"#;

    fn write_workflow(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn validate_accepts_a_wellformed_file() {
        let file = write_workflow(SAMPLE);
        validate(file.path().to_str().unwrap()).unwrap();
    }

    #[test]
    fn validate_rejects_a_cyclic_file() {
        let file = write_workflow(
            r#"
[workflow]
name = "cyclic"

[[steps]]
name = "a"
step_type = "task"
depends_on = ["b"]

[[steps]]
name = "b"
step_type = "task"
depends_on = ["a"]
"#,
        );
        let err = validate(file.path().to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("cycle"), "got: {err:#}");
    }

    #[tokio::test]
    async fn run_executes_with_builtin_agents() {
        let file = write_workflow(SAMPLE);
        run(file.path().to_str().unwrap(), 2, &[], false)
            .await
            .unwrap();
    }

    #[test]
    fn inputs_parse_typed_values() {
        let inputs = parse_inputs(&[
            "count=3".to_string(),
            "flag=true".to_string(),
            "name=release".to_string(),
        ])
        .unwrap();
        assert_eq!(inputs["count"], 3);
        assert_eq!(inputs["flag"], true);
        assert_eq!(inputs["name"], "release");
    }

    #[test]
    fn inputs_reject_missing_equals() {
        let err = parse_inputs(&["oops".to_string()]).unwrap_err();
        assert!(err.to_string().contains("KEY=VALUE"));
    }
}
