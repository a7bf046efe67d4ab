//! OAuth token lookups — the read-only contract consumed by the
//! deployment manager's provider context resolution (GitHub
//! `installation_id`, Slack `team_id`).

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::OAuthTokenRow};

/// Look up the active OAuth token for a `(user_id, provider)` pair.
pub async fn get_token(
    pool: &PgPool,
    user_id: Uuid,
    provider: &str,
) -> Result<OAuthTokenRow, DbError> {
    let row = sqlx::query_as!(
        OAuthTokenRow,
        r#"SELECT id, user_id, provider, access_token, credential_data FROM oauth_tokens WHERE user_id = $1 AND provider = $2"#,
        user_id,
        provider,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}
