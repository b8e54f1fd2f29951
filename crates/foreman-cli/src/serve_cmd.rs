//! `foreman serve`: HTTP status/submit API over the orchestrator.
//!
//! Gated by `ORCHESTRATOR_ENABLE_API_ADAPTER`. Exposes the orchestrator
//! status snapshot, synchronous task submission, and workflow execution.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use foreman_agents::default_agents;
use foreman_core::task::{Task, TaskPriority, TaskResult, TaskType};
use foreman_core::workflow::{Workflow, WorkflowDoc, WorkflowEngine};
use foreman_core::{Config, Orchestrator, OrchestratorStatus};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub title: String,
    pub description: String,
    pub task_type: String,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task_id: Uuid,
    #[serde(flatten)]
    pub result: TaskResult,
}

#[derive(Debug, Serialize)]
pub struct WorkflowStatusResponse {
    pub workflow_id: Uuid,
    pub status: String,
}

// ---------------------------------------------------------------------------
// State and router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Mutex<Orchestrator>>,
    engine: Arc<WorkflowEngine>,
}

/// Build the API router backed by an orchestrator and engine with the
/// built-in agents registered.
pub async fn build_router() -> Result<Router> {
    let mut orchestrator = Orchestrator::default();
    for agent in default_agents() {
        orchestrator.register_agent(agent).await?;
    }
    orchestrator.start();

    let mut engine = WorkflowEngine::new();
    engine.register_agents(default_agents());

    let state = AppState {
        orchestrator: Arc::new(Mutex::new(orchestrator)),
        engine: Arc::new(engine),
    };

    Ok(Router::new()
        .route("/status", get(get_status))
        .route("/tasks", post(submit_task))
        .route("/workflows/run", post(run_workflow))
        .route("/workflows/{id}", get(get_workflow))
        .layer(CorsLayer::permissive())
        .with_state(state))
}

/// Run the API server.
pub async fn serve(addr: &str, config: &Config) -> Result<()> {
    if !config.enable_api_adapter {
        bail!("the API adapter is disabled; set ORCHESTRATOR_ENABLE_API_ADAPTER=true to enable it");
    }

    let router = build_router().await?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "API adapter listening");
    axum::serve(listener, router)
        .await
        .context("server terminated")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_status(State(state): State<AppState>) -> Json<OrchestratorStatus> {
    let orchestrator = state.orchestrator.lock().await;
    Json(orchestrator.get_status())
}

async fn submit_task(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    let task_type: TaskType = request
        .task_type
        .parse()
        .map_err(|_| AppError::bad_request(format!("invalid task type: {:?}", request.task_type)))?;
    let priority = match &request.priority {
        Some(p) => p
            .parse::<TaskPriority>()
            .map_err(|_| AppError::bad_request(format!("invalid priority: {p:?}")))?,
        None => TaskPriority::Medium,
    };

    let mut task = Task::new(request.title, request.description, task_type, priority);
    let mut orchestrator = state.orchestrator.lock().await;
    let result = orchestrator.process_task(&mut task).await;
    let task_id = task.id;
    orchestrator.submit_task(task);

    Ok(Json(TaskResponse { task_id, result }))
}

async fn run_workflow(
    State(state): State<AppState>,
    Json(doc): Json<WorkflowDoc>,
) -> Result<impl IntoResponse, AppError> {
    let mut workflow = Workflow::from_doc(doc)
        .map_err(|e| AppError::bad_request(format!("invalid workflow: {e}")))?;
    let result = state.engine.execute(&mut workflow, None).await;
    Ok(Json(result))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(result) = state.engine.get_result(id) {
        return Ok(Json(serde_json::to_value(&result).unwrap_or_default()));
    }
    match state.engine.get_status(id) {
        Some(status) => Ok(Json(
            serde_json::to_value(WorkflowStatusResponse {
                workflow_id: id,
                status: status.to_string(),
            })
            .unwrap_or_default(),
        )),
        None => Err(AppError::not_found(format!("workflow {id} not found"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
