//! `OAuthTokenStore` — the read-only contract `DeploymentManager` uses to
//! resolve a workflow owner's already-granted provider credentials
//! (GitHub App installation id, Slack workspace token) at deploy time.
//!
//! The OAuth grant/exchange flow that populates `oauth_tokens` in the
//! first place is an HTTP-gateway concern and out of scope here; this
//! trait only covers the read side the deployment manager needs.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::SchedulerError;

/// A resolved provider credential.
#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub access_token: String,
    /// Provider-specific fields: `installation_id` for GitHub, `team_id`
    /// for Slack.
    pub credential_data: Value,
}

#[async_trait]
pub trait OAuthTokenStore: Send + Sync {
    /// Look up the stored credential for `(owner_id, provider)`. `Ok(None)`
    /// means no credential is on file, not an error.
    async fn get_token(&self, owner_id: Uuid, provider: &str) -> Result<Option<OAuthToken>, SchedulerError>;
}

/// Postgres-backed `OAuthTokenStore` over the `oauth_tokens` table.
pub struct PgOAuthTokenStore {
    pool: db::DbPool,
}

impl PgOAuthTokenStore {
    pub fn new(pool: db::DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuthTokenStore for PgOAuthTokenStore {
    async fn get_token(&self, owner_id: Uuid, provider: &str) -> Result<Option<OAuthToken>, SchedulerError> {
        match db::repository::oauth::get_token(&self.pool, owner_id, provider).await {
            Ok(row) => Ok(Some(OAuthToken { access_token: row.access_token, credential_data: row.credential_data })),
            Err(db::DbError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
