//! Append-only deployment history log.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::DeploymentHistoryRow};

/// Append a deployment history row. `from_status`/`to_status` are expected
/// in `SCREAMING_SNAKE_CASE` (see `DeploymentStatus`'s serde rename).
#[allow(clippy::too_many_arguments)]
pub async fn append(
    pool: &PgPool,
    workflow_id: Uuid,
    action: &str,
    from_status: &str,
    to_status: &str,
    deployment_version: i32,
    error_message: Option<&str>,
    config_snapshot: serde_json::Value,
) -> Result<DeploymentHistoryRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        DeploymentHistoryRow,
        r#"
        INSERT INTO deployment_history
            (id, workflow_id, action, from_status, to_status, deployment_version, error_message, config_snapshot, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, workflow_id, action, from_status, to_status, deployment_version, error_message, config_snapshot, created_at
        "#,
        id,
        workflow_id,
        action,
        from_status,
        to_status,
        deployment_version,
        error_message,
        config_snapshot,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Return the full history for a workflow, oldest first.
pub async fn list_for_workflow(
    pool: &PgPool,
    workflow_id: Uuid,
) -> Result<Vec<DeploymentHistoryRow>, DbError> {
    let rows = sqlx::query_as!(
        DeploymentHistoryRow,
        r#"
        SELECT id, workflow_id, action, from_status, to_status, deployment_version, error_message, config_snapshot, created_at
        FROM deployment_history
        WHERE workflow_id = $1
        ORDER BY created_at ASC
        "#,
        workflow_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
