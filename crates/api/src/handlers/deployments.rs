//! Deployment lifecycle endpoints — thin wrappers over `scheduler::DeploymentManager`.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::AppState;
use crate::ApiError;
use scheduler::DeploymentOutcome;

pub async fn deploy(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<DeploymentOutcome>, ApiError> {
    Ok(Json(state.scheduler.deploy(id).await?))
}

pub async fn undeploy(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<DeploymentOutcome>, ApiError> {
    Ok(Json(state.scheduler.undeploy(id).await?))
}

pub async fn pause(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<DeploymentOutcome>, ApiError> {
    Ok(Json(state.scheduler.pause(id).await?))
}

pub async fn resume(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<DeploymentOutcome>, ApiError> {
    Ok(Json(state.scheduler.resume(id).await?))
}
