//! Best-effort audit trail for inbound GitHub webhook deliveries.
//!
//! A failure to persist one of these rows must never block routing —
//! callers are expected to log and swallow the error.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::GithubWebhookEventRow};

pub async fn record(
    pool: &PgPool,
    delivery_id: &str,
    event_type: &str,
    repo_full_name: Option<&str>,
    payload: serde_json::Value,
) -> Result<GithubWebhookEventRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        GithubWebhookEventRow,
        r#"
        INSERT INTO github_webhook_events (id, delivery_id, event_type, repo_full_name, payload, received_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, delivery_id, event_type, repo_full_name, payload, received_at
        "#,
        id,
        delivery_id,
        event_type,
        repo_full_name,
        payload,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}
