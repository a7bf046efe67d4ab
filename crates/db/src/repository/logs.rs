//! Durable sink for `LogEntry` — the persistent half of the execution
//! logger's ring buffer (see `engine::logger::LogSink`).

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::LogEntryRow};

#[allow(clippy::too_many_arguments)]
pub async fn append(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: Option<&str>,
    level: &str,
    message: &str,
    structured_data: Option<serde_json::Value>,
    trace_id: Option<&str>,
) -> Result<LogEntryRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        LogEntryRow,
        r#"
        INSERT INTO log_entries (id, execution_id, node_id, level, message, structured_data, trace_id, logged_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, execution_id, node_id, level, message, structured_data, trace_id, logged_at
        "#,
        id,
        execution_id,
        node_id,
        level,
        message,
        structured_data,
        trace_id,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn list_for_execution(
    pool: &PgPool,
    execution_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<LogEntryRow>, DbError> {
    let rows = sqlx::query_as!(
        LogEntryRow,
        r#"
        SELECT id, execution_id, node_id, level, message, structured_data, trace_id, logged_at
        FROM log_entries
        WHERE execution_id = $1
        ORDER BY logged_at ASC
        LIMIT $2 OFFSET $3
        "#,
        execution_id,
        limit,
        offset,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
