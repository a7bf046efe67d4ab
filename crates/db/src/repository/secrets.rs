//! Workflow-scoped secret storage.
//!
//! Values are stored and returned as opaque strings — encryption at rest
//! is handled by the database layer (column-level encryption or a KMS
//! proxy in front of Postgres), not by this crate.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::SecretRow};

/// List every secret registered for a workflow.
pub async fn list_for_workflow(pool: &PgPool, workflow_id: Uuid) -> Result<Vec<SecretRow>, DbError> {
    let rows = sqlx::query_as!(
        SecretRow,
        r#"SELECT id, workflow_id, key, encrypted_value FROM secrets WHERE workflow_id = $1"#,
        workflow_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Upsert a single secret by `(workflow_id, key)`.
pub async fn set(pool: &PgPool, workflow_id: Uuid, key: &str, encrypted_value: &str) -> Result<SecretRow, DbError> {
    let existing = sqlx::query_as!(
        SecretRow,
        r#"SELECT id, workflow_id, key, encrypted_value FROM secrets WHERE workflow_id = $1 AND key = $2"#,
        workflow_id,
        key,
    )
    .fetch_optional(pool)
    .await?;

    let row = match existing {
        Some(row) => {
            sqlx::query!(
                r#"UPDATE secrets SET encrypted_value = $1 WHERE id = $2"#,
                encrypted_value,
                row.id,
            )
            .execute(pool)
            .await?;
            SecretRow { encrypted_value: encrypted_value.to_string(), ..row }
        }
        None => {
            let id = Uuid::new_v4();
            sqlx::query!(
                r#"INSERT INTO secrets (id, workflow_id, key, encrypted_value) VALUES ($1, $2, $3, $4)"#,
                id,
                workflow_id,
                key,
                encrypted_value,
            )
            .execute(pool)
            .await?;
            SecretRow { id, workflow_id, key: key.to_string(), encrypted_value: encrypted_value.to_string() }
        }
    };

    Ok(row)
}

/// Remove a secret. No-op if it doesn't exist.
pub async fn delete(pool: &PgPool, workflow_id: Uuid, key: &str) -> Result<(), DbError> {
    sqlx::query!(
        r#"DELETE FROM secrets WHERE workflow_id = $1 AND key = $2"#,
        workflow_id,
        key,
    )
    .execute(pool)
    .await?;

    Ok(())
}
