use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::AppState;
use db::repository::secrets as secrets_repo;

/// A secret's key, never its value — `list` is for inventory, not retrieval.
#[derive(Serialize)]
pub struct SecretSummary {
    pub key: String,
}

#[derive(serde::Deserialize)]
pub struct SetSecretDto {
    pub key: String,
    pub value: String,
}

pub async fn list(Path(workflow_id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Vec<SecretSummary>>, StatusCode> {
    match secrets_repo::list_for_workflow(&state.pool, workflow_id).await {
        Ok(rows) => Ok(Json(rows.into_iter().map(|r| SecretSummary { key: r.key }).collect())),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub async fn set(
    Path(workflow_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<SetSecretDto>,
) -> Result<StatusCode, StatusCode> {
    match secrets_repo::set(&state.pool, workflow_id, &payload.key, &payload.value).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub async fn delete(Path((workflow_id, key)): Path<(Uuid, String)>, State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    match secrets_repo::delete(&state.pool, workflow_id, &key).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
