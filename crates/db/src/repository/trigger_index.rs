//! Trigger index (C1) persistence — the reverse lookup from
//! `(trigger_type, index_key)` to deployed workflows.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::TriggerIndexRowData};

/// Insert one row per trigger spec for a workflow, inside a single
/// transaction so registration is atomic per `workflow_id`.
pub async fn register(
    pool: &PgPool,
    workflow_id: Uuid,
    specs: &[(String, String, serde_json::Value)],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for (trigger_type, index_key, trigger_config) in specs {
        let id = Uuid::new_v4();
        sqlx::query!(
            r#"
            INSERT INTO trigger_index (id, workflow_id, trigger_type, index_key, trigger_config, deployment_status)
            VALUES ($1, $2, $3, $4, $5, 'active')
            "#,
            id,
            workflow_id,
            trigger_type,
            index_key,
            trigger_config,
        )
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Delete all trigger index rows for a workflow.
pub async fn unregister(pool: &PgPool, workflow_id: Uuid) -> Result<(), DbError> {
    sqlx::query!("DELETE FROM trigger_index WHERE workflow_id = $1", workflow_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Bulk status change for every row belonging to a workflow (pause/resume).
pub async fn update_status(pool: &PgPool, workflow_id: Uuid, status: &str) -> Result<(), DbError> {
    sqlx::query!(
        "UPDATE trigger_index SET deployment_status = $1 WHERE workflow_id = $2",
        status,
        workflow_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Return active rows matching `(trigger_type, index_key)` exactly.
pub async fn query(
    pool: &PgPool,
    trigger_type: &str,
    index_key: &str,
) -> Result<Vec<TriggerIndexRowData>, DbError> {
    let rows = sqlx::query_as!(
        TriggerIndexRowData,
        r#"
        SELECT id, workflow_id, trigger_type, index_key, trigger_config, deployment_status
        FROM trigger_index
        WHERE trigger_type = $1 AND index_key = $2 AND deployment_status = 'active'
        "#,
        trigger_type,
        index_key,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Return all active rows for a trigger type, used by dispatchers that
/// enumerate every registration (e.g. the cron scheduler refreshing its
/// schedule table).
pub async fn list_active(pool: &PgPool, trigger_type: &str) -> Result<Vec<TriggerIndexRowData>, DbError> {
    let rows = sqlx::query_as!(
        TriggerIndexRowData,
        r#"
        SELECT id, workflow_id, trigger_type, index_key, trigger_config, deployment_status
        FROM trigger_index
        WHERE trigger_type = $1 AND deployment_status = 'active'
        "#,
        trigger_type,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Counts by `(trigger_type, deployment_status)`, plus the distinct set of
/// webhook paths and GitHub repos currently registered — backs C1's
/// `stats()` operation / the `get_index_statistics` API.
pub struct IndexStats {
    pub counts_by_type_and_status: Vec<(String, String, i64)>,
    pub webhook_paths: Vec<String>,
    pub github_repos: Vec<String>,
}

pub async fn stats(pool: &PgPool) -> Result<IndexStats, DbError> {
    let counts = sqlx::query!(
        r#"SELECT trigger_type, deployment_status, COUNT(*) as "count!" FROM trigger_index GROUP BY trigger_type, deployment_status"#
    )
    .fetch_all(pool)
    .await?;

    let webhook_paths = sqlx::query!(
        r#"SELECT DISTINCT index_key FROM trigger_index WHERE trigger_type = 'WEBHOOK'"#
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|r| r.index_key)
    .collect();

    let github_repos = sqlx::query!(
        r#"SELECT DISTINCT index_key FROM trigger_index WHERE trigger_type = 'GITHUB' AND index_key != ''"#
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|r| r.index_key)
    .collect();

    Ok(IndexStats {
        counts_by_type_and_status: counts
            .into_iter()
            .map(|r| (r.trigger_type, r.deployment_status, r.count))
            .collect(),
        webhook_paths,
        github_repos,
    })
}
