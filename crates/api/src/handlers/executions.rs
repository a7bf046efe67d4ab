use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::AppState;
use db::repository::{executions as exec_repo, jobs as job_repo, workflows as wf_repo};

#[derive(serde::Deserialize)]
pub struct ExecuteWorkflowDto {
    pub input: Value,
}

#[derive(serde::Deserialize)]
pub struct ResumeNodeDto {
    pub resolved_input: Value,
}

/// Manually trigger a workflow run. The execution row is created
/// synchronously; the actual run is picked up by a worker process polling
/// `job_queue` (see `cli`'s `worker` subcommand).
pub async fn execute(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ExecuteWorkflowDto>,
) -> Result<(StatusCode, Json<db::models::JobRow>), StatusCode> {
    let workflow = match wf_repo::get_workflow(&state.pool, id).await {
        Ok(w) => w,
        Err(db::DbError::NotFound) => return Err(StatusCode::NOT_FOUND),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let exec = match exec_repo::create_execution(&state.pool, id, workflow.version, payload.input.clone()).await {
        Ok(e) => e,
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let job = match job_repo::enqueue_job(&state.pool, exec.id, id, payload.input).await {
        Ok(j) => j,
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub async fn get(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<db::models::WorkflowExecutionRow>, StatusCode> {
    match exec_repo::get_execution(&state.pool, id).await {
        Ok(e) => Ok(Json(e)),
        Err(db::DbError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Node-level execution trace for one run, ordered by start time.
pub async fn logs(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Vec<db::models::NodeExecutionRow>>, StatusCode> {
    match exec_repo::list_node_executions(&state.pool, id).await {
        Ok(rows) => Ok(Json(rows)),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Resume a parked `HUMAN_IN_THE_LOOP` node (spec.md Open Question 4 — a
/// dedicated entrypoint, not an in-core state transition the engine drives
/// by itself).
///
/// Enqueues a resume job rather than re-entering the engine inline: the API
/// process doesn't hold a `NodeRegistry`/`WorkflowExecutor`, only the
/// worker does (mirrors how `execute` hands a fresh run to the worker via
/// `job_queue` instead of running it in-process).
pub async fn resume_node(
    Path((execution_id, node_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
    Json(payload): Json<ResumeNodeDto>,
) -> Result<(StatusCode, Json<db::models::JobRow>), StatusCode> {
    let execution = match exec_repo::get_execution(&state.pool, execution_id).await {
        Ok(e) => e,
        Err(db::DbError::NotFound) => return Err(StatusCode::NOT_FOUND),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };
    if execution.status != "paused" {
        return Err(StatusCode::CONFLICT);
    }

    let job = job_repo::enqueue_resume_job(
        &state.pool,
        execution_id,
        execution.workflow_id,
        &node_id,
        payload.resolved_input,
    )
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::ACCEPTED, Json(job)))
}
