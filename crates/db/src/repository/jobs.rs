//! Job queue repository functions backing the worker's poll loop.
//!
//! One row per workflow execution that's ready to run. Workers claim rows
//! with `SELECT … FOR UPDATE SKIP LOCKED` so several worker processes can
//! poll the same table without double-processing a job.

use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::{DbError, models::JobRow};

/// Enqueue a job for a workflow execution. `payload` is the trigger data
/// the worker hands to `WorkflowExecutor::run` as the root input.
pub async fn enqueue_job(
    pool: &PgPool,
    execution_id: Uuid,
    workflow_id: Uuid,
    payload: serde_json::Value,
) -> Result<JobRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    debug!(%execution_id, %workflow_id, "enqueuing job");

    let row = sqlx::query_as!(
        JobRow,
        r#"
        INSERT INTO job_queue
            (id, execution_id, workflow_id, status, attempts, max_attempts, payload, created_at, updated_at)
        VALUES ($1, $2, $3, 'pending', 0, 3, $4, $5, $5)
        RETURNING id, execution_id, workflow_id, status, attempts, max_attempts, payload, resume_node_id, resolved_input, created_at, updated_at
        "#,
        id,
        execution_id,
        workflow_id,
        payload,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Enqueue a resume job for a parked `HUMAN_IN_THE_LOOP` node (spec.md Open
/// Question 4). The worker re-enters the engine for `execution_id` instead
/// of starting a fresh run.
pub async fn enqueue_resume_job(
    pool: &PgPool,
    execution_id: Uuid,
    workflow_id: Uuid,
    node_id: &str,
    resolved_input: serde_json::Value,
) -> Result<JobRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    debug!(%execution_id, %workflow_id, node_id, "enqueuing resume job");

    let row = sqlx::query_as!(
        JobRow,
        r#"
        INSERT INTO job_queue
            (id, execution_id, workflow_id, status, attempts, max_attempts, payload, resume_node_id, resolved_input, created_at, updated_at)
        VALUES ($1, $2, $3, 'pending', 0, 3, $4, $5, $6, $7, $7)
        RETURNING id, execution_id, workflow_id, status, attempts, max_attempts, payload, resume_node_id, resolved_input, created_at, updated_at
        "#,
        id,
        execution_id,
        workflow_id,
        serde_json::Value::Null,
        node_id,
        resolved_input,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Atomically fetch the oldest pending job and mark it as `processing`.
///
/// Uses `SELECT … FOR UPDATE SKIP LOCKED` so multiple workers can poll
/// safely without stepping on each other.
///
/// Returns `None` if no pending jobs exist.
pub async fn fetch_next_job(pool: &PgPool) -> Result<Option<JobRow>, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as!(
        JobRow,
        r#"
        SELECT id, execution_id, workflow_id, status, attempts, max_attempts, payload, resume_node_id, resolved_input, created_at, updated_at
        FROM job_queue
        WHERE status = 'pending'
        ORDER BY created_at ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(ref job) = row {
        let now = Utc::now();
        sqlx::query!(
            r#"
            UPDATE job_queue
            SET status = 'processing', attempts = attempts + 1, updated_at = $1
            WHERE id = $2
            "#,
            now,
            job.id,
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    } else {
        tx.rollback().await?;
    }

    Ok(row)
}

/// Mark a job as completed.
pub async fn complete_job(pool: &PgPool, job_id: Uuid) -> Result<(), DbError> {
    sqlx::query!(
        "UPDATE job_queue SET status = 'completed', updated_at = $1 WHERE id = $2",
        Utc::now(),
        job_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a job as failed (or dead-lettered when `max_attempts` is reached).
pub async fn fail_job(pool: &PgPool, job_id: Uuid, max_attempts: i32) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE job_queue
        SET status = CASE WHEN attempts >= $1 THEN 'dead_lettered' ELSE 'pending' END,
            updated_at = $2
        WHERE id = $3
        "#,
        max_attempts,
        Utc::now(),
        job_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}
