use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::AppState;
use crate::ApiError;
use db::repository::workflows as wf_repo;
use engine::Workflow;

#[derive(serde::Deserialize)]
pub struct CreateWorkflowDto {
    pub name: String,
    pub definition: Value,
}

#[derive(serde::Deserialize)]
pub struct UpdateWorkflowDto {
    pub definition: Value,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<db::models::WorkflowRow>>, ApiError> {
    Ok(Json(wf_repo::list_workflows(&state.pool).await?))
}

pub async fn get(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<db::models::WorkflowRow>, ApiError> {
    Ok(Json(wf_repo::get_workflow(&state.pool, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowDto>,
) -> Result<(StatusCode, Json<db::models::WorkflowRow>), ApiError> {
    serde_json::from_value::<Workflow>(payload.definition.clone())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let wf = wf_repo::create_workflow(&state.pool, &payload.name, payload.definition).await?;
    Ok((StatusCode::CREATED, Json(wf)))
}

/// Replace a workflow's definition. Goes through the deployment manager
/// (not a bare repository update) so a deployed workflow's trigger index
/// is re-registered against the new definition.
pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateWorkflowDto>,
) -> Result<Json<scheduler::DeploymentOutcome>, ApiError> {
    serde_json::from_value::<Workflow>(payload.definition.clone())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(state.scheduler.update(id, payload.definition).await?))
}

pub async fn delete(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    wf_repo::delete_workflow(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
