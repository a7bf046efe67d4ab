//! Execution and node-execution repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{NodeExecutionRow, WorkflowExecutionRow},
};

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// Create a new workflow execution record in `new` status.
pub async fn create_execution(
    pool: &PgPool,
    workflow_id: Uuid,
    workflow_version: i32,
    trigger_info: serde_json::Value,
) -> Result<WorkflowExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowExecutionRow,
        r#"
        INSERT INTO workflow_executions (id, workflow_id, workflow_version, status, trigger_info, started_at)
        VALUES ($1, $2, $3, 'new', $4, $5)
        RETURNING id, workflow_id, workflow_version, status, trigger_info, started_at, finished_at
        "#,
        id,
        workflow_id,
        workflow_version,
        trigger_info,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Update the `status` (and optionally `finished_at`) of a workflow execution.
pub async fn update_execution_status(
    pool: &PgPool,
    execution_id: Uuid,
    status: &str,
    finished: bool,
) -> Result<(), DbError> {
    if finished {
        sqlx::query!(
            r#"
            UPDATE workflow_executions
            SET status = $1, finished_at = $2
            WHERE id = $3
            "#,
            status,
            Utc::now(),
            execution_id,
        )
        .execute(pool)
        .await?;
    } else {
        sqlx::query!(
            r#"UPDATE workflow_executions SET status = $1 WHERE id = $2"#,
            status,
            execution_id,
        )
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Fetch a single execution by id.
pub async fn get_execution(pool: &PgPool, execution_id: Uuid) -> Result<WorkflowExecutionRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowExecutionRow,
        r#"SELECT id, workflow_id, workflow_version, status, trigger_info, started_at, finished_at FROM workflow_executions WHERE id = $1"#,
        execution_id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// Insert a new node execution record, typically in `QUEUED` phase.
#[allow(clippy::too_many_arguments)]
pub async fn insert_node_execution(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: &str,
    phase: &str,
    input_parameters: serde_json::Value,
    output_parameters: Option<serde_json::Value>,
    error_details: Option<serde_json::Value>,
    started_at: chrono::DateTime<Utc>,
    finished_at: Option<chrono::DateTime<Utc>>,
) -> Result<NodeExecutionRow, DbError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        INSERT INTO node_executions
            (id, execution_id, node_id, phase, input_parameters, output_parameters, error_details, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, execution_id, node_id, phase, input_parameters, output_parameters, error_details, started_at, finished_at
        "#,
        id,
        execution_id,
        node_id,
        phase,
        input_parameters,
        output_parameters,
        error_details,
        started_at,
        finished_at,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Flip a parked `WAITING_HUMAN` row to `COMPLETED` with the externally
/// resolved output. Returns `None` if no such row exists (wrong node id, or
/// the node already resumed).
pub async fn complete_waiting_node(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: &str,
    resolved_output: serde_json::Value,
    finished_at: chrono::DateTime<Utc>,
) -> Result<Option<NodeExecutionRow>, DbError> {
    let row = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        UPDATE node_executions
        SET phase = 'COMPLETED', output_parameters = $1, finished_at = $2
        WHERE execution_id = $3 AND node_id = $4 AND phase = 'WAITING_HUMAN'
        RETURNING id, execution_id, node_id, phase, input_parameters, output_parameters, error_details, started_at, finished_at
        "#,
        resolved_output,
        finished_at,
        execution_id,
        node_id,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List every node execution recorded for an execution, in start order.
pub async fn list_node_executions(
    pool: &PgPool,
    execution_id: Uuid,
) -> Result<Vec<NodeExecutionRow>, DbError> {
    let rows = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        SELECT id, execution_id, node_id, phase, input_parameters, output_parameters, error_details, started_at, finished_at
        FROM node_executions
        WHERE execution_id = $1
        ORDER BY started_at ASC
        "#,
        execution_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
