//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `engine` and `scheduler` crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow definition row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    pub version: i32,
    /// Full JSON workflow definition (nodes, connections, settings, metadata).
    pub definition: serde_json::Value,
    pub deployment_status: String,
    pub deployment_version: i32,
    pub deployed_at: Option<DateTime<Utc>>,
    pub undeployed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// Possible statuses for a workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum ExecutionStatus {
    New,
    Running,
    Paused,
    Completed,
    Error,
    Canceled,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// A persisted workflow execution row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowExecutionRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_version: i32,
    pub status: String,
    pub trigger_info: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// A persisted node execution row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeExecutionRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub phase: String,
    pub input_parameters: serde_json::Value,
    pub output_parameters: Option<serde_json::Value>,
    pub error_details: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// secrets / oauth tokens
// ---------------------------------------------------------------------------

/// A persisted secret row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecretRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub key: String,
    /// AES-256 encrypted value (base64-encoded ciphertext).
    pub encrypted_value: String,
}

/// A persisted OAuth credential row, keyed by `(user_id, provider)`.
///
/// `credential_data` holds provider-specific fields (`installation_id`
/// for GitHub, `team_id` for Slack) consumed by the deployment manager's
/// provider context resolution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OAuthTokenRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub access_token: String,
    pub credential_data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// trigger_index
// ---------------------------------------------------------------------------

/// A persisted trigger index row (C1).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TriggerIndexRowData {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub trigger_type: String,
    pub index_key: String,
    pub trigger_config: serde_json::Value,
    pub deployment_status: String,
}

// ---------------------------------------------------------------------------
// deployment_history
// ---------------------------------------------------------------------------

/// An append-only deployment history row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeploymentHistoryRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub action: String,
    pub from_status: String,
    pub to_status: String,
    pub deployment_version: i32,
    pub error_message: Option<String>,
    pub config_snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// github_webhook_events (best-effort audit trail)
// ---------------------------------------------------------------------------

/// An audit record of an inbound GitHub webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GithubWebhookEventRow {
    pub id: Uuid,
    pub delivery_id: String,
    pub event_type: String,
    pub repo_full_name: Option<String>,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// log_entries
// ---------------------------------------------------------------------------

/// A persisted log entry row — the optional durable side of the execution
/// logger's in-memory ring buffer (see `engine::logger`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LogEntryRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: Option<String>,
    pub level: String,
    pub message: String,
    pub structured_data: Option<serde_json::Value>,
    pub trace_id: Option<String>,
    pub logged_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// job_queue
// ---------------------------------------------------------------------------

/// Possible statuses for a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    DeadLettered,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::DeadLettered => write!(f, "dead_lettered"),
        }
    }
}

/// A job row fetched from the queue table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload: serde_json::Value,
    /// Set only for a resume job: the `WAITING_HUMAN` node this job should
    /// re-enter the engine for, instead of starting a fresh run.
    pub resume_node_id: Option<String>,
    pub resolved_input: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
