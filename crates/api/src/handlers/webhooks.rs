//! Inbound webhook endpoints — signature verification, then routing
//! through the trigger index (C2) to every matching workflow.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::AppState;
use db::repository::{executions as exec_repo, jobs as job_repo, workflows as wf_repo};
use scheduler::{router, signature};

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn dispatch_to_workflows(state: &AppState, workflow_ids: &[uuid::Uuid], trigger_data: Value) {
    for workflow_id in workflow_ids {
        let workflow = match wf_repo::get_workflow(&state.pool, *workflow_id).await {
            Ok(w) => w,
            Err(_) => continue,
        };

        let exec = match exec_repo::create_execution(&state.pool, *workflow_id, workflow.version, trigger_data.clone()).await {
            Ok(e) => e,
            Err(_) => continue,
        };

        let _ = job_repo::enqueue_job(&state.pool, exec.id, *workflow_id, trigger_data.clone()).await;
    }
}

pub async fn github(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>, StatusCode> {
    let signature_header = header_str(&headers, "x-hub-signature-256").ok_or(StatusCode::UNAUTHORIZED)?;
    if !signature::verify_github_signature(&body, signature_header, &state.secrets.github_webhook_secret) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let event_type = header_str(&headers, "x-github-event").unwrap_or("unknown").to_string();
    let delivery_id = header_str(&headers, "x-github-delivery").unwrap_or("unknown").to_string();

    let payload: Value = serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
    let repo_full_name = payload.get("repository").and_then(|r| r.get("full_name")).and_then(Value::as_str).unwrap_or("");

    let _ = db::repository::github_events::record(&state.pool, &delivery_id, &event_type, Some(repo_full_name), payload.clone()).await;

    let workflow_ids = router::route_github(&state.pool, repo_full_name, &event_type, &payload)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    dispatch_to_workflows(&state, &workflow_ids, payload).await;

    Ok(Json(serde_json::json!({ "matched_workflows": workflow_ids.len() })))
}

pub async fn slack_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>, StatusCode> {
    let timestamp = header_str(&headers, "x-slack-request-timestamp").ok_or(StatusCode::UNAUTHORIZED)?;
    let signature_header = header_str(&headers, "x-slack-signature").ok_or(StatusCode::UNAUTHORIZED)?;
    let now = chrono::Utc::now().timestamp();

    if !signature::verify_slack_signature(timestamp, signature_header, &body, &state.secrets.slack_signing_secret, now) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;

    if payload.get("type").and_then(Value::as_str) == Some("url_verification") {
        return Ok(Json(serde_json::json!({ "challenge": payload.get("challenge").cloned().unwrap_or(Value::Null) })));
    }

    let team_id = payload.get("team_id").and_then(Value::as_str).unwrap_or("");

    let workflow_ids = router::route_slack(&state.pool, team_id, &payload)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    dispatch_to_workflows(&state, &workflow_ids, payload).await;

    Ok(Json(serde_json::json!({ "matched_workflows": workflow_ids.len() })))
}

pub async fn slack_commands(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>, StatusCode> {
    let timestamp = header_str(&headers, "x-slack-request-timestamp").ok_or(StatusCode::UNAUTHORIZED)?;
    let signature_header = header_str(&headers, "x-slack-signature").ok_or(StatusCode::UNAUTHORIZED)?;
    let now = chrono::Utc::now().timestamp();

    if !signature::verify_slack_signature(timestamp, signature_header, &body, &state.secrets.slack_signing_secret, now) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(Json(serde_json::json!({ "response_type": "ephemeral", "text": "command received" })))
}

/// Generic webhook ingest bound directly to one workflow (spec.md §6:
/// `POST /webhook/workflow/{workflow_id}`), as opposed to `/webhooks/github`
/// and `/webhooks/slack/*` which resolve the workflow set from the trigger
/// index by path. The workflow is already known from the URL, so this
/// skips the index lookup and enqueues a run directly — the Manual/Webhook
/// dispatcher's contract of "invoke the engine when fired", collapsed to
/// the one workflow the caller named.
pub async fn workflow_webhook(
    Path(workflow_id): Path<Uuid>,
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    axum::extract::RawQuery(query): axum::extract::RawQuery,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let workflow = match wf_repo::get_workflow(&state.pool, workflow_id).await {
        Ok(w) => w,
        Err(db::DbError::NotFound) => return Err(StatusCode::NOT_FOUND),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let body_value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let header_map: serde_json::Map<String, Value> = headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.as_str().to_string(), Value::String(s.to_string()))))
        .collect();

    let envelope = serde_json::json!({
        "method": method.as_str(),
        "path": format!("/webhook/workflow/{workflow_id}"),
        "query_params": query.unwrap_or_default(),
        "headers": Value::Object(header_map),
        "body": body_value,
    });

    let exec = exec_repo::create_execution(&state.pool, workflow_id, workflow.version, envelope.clone())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    job_repo::enqueue_job(&state.pool, exec.id, workflow_id, envelope)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({ "execution_id": exec.id })))
}
