//! Trigger and deployment domain types (`spec.md` §3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The trigger families C1 indexes. Stored as the `trigger_index.trigger_type`
/// column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    Webhook,
    Slack,
    Github,
    Cron,
    Manual,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "WEBHOOK",
            Self::Slack => "SLACK",
            Self::Github => "GITHUB",
            Self::Cron => "CRON",
            Self::Manual => "MANUAL",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single trigger registration extracted from one `TRIGGER` node — what
/// C1 persists into `trigger_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub trigger_type: TriggerType,
    /// The reverse-lookup key: webhook path, GitHub `owner/repo` (or `""`
    /// for account-wide), Slack team id (or `""` for workspace-wide), cron
    /// expression, or `""` for manual triggers.
    pub index_key: String,
    pub trigger_config: serde_json::Value,
}

/// Deployment lifecycle states (`spec.md` §3, uppercase per Open
/// Question 2 — no lowercase variant used anywhere).
///
/// Pause/resume never appear here: spec.md:149 models them as a
/// `deployment_status` on `TriggerIndex` rows, not a workflow state, so a
/// paused workflow's own status stays `DEPLOYED` throughout (see
/// [`crate::deployment::DeploymentManager::pause`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Undeployed,
    Deploying,
    Deployed,
    DeploymentFailed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undeployed => "UNDEPLOYED",
            Self::Deploying => "DEPLOYING",
            Self::Deployed => "DEPLOYED",
            Self::DeploymentFailed => "DEPLOYMENT_FAILED",
        }
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNDEPLOYED" => Ok(Self::Undeployed),
            "DEPLOYING" => Ok(Self::Deploying),
            "DEPLOYED" => Ok(Self::Deployed),
            "DEPLOYMENT_FAILED" => Ok(Self::DeploymentFailed),
            other => Err(format!("unknown deployment status: {other}")),
        }
    }
}

/// A deployment operation's result, returned to the API layer.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentOutcome {
    pub workflow_id: Uuid,
    pub status: DeploymentStatus,
    pub deployment_version: i32,
    pub trigger_count: usize,
    /// Set only by `pause`/`resume`: the `trigger_index` rows'
    /// `deployment_status` (`"active"`/`"inactive"`) those calls just set.
    /// The workflow-level `status` above is unaffected by pausing.
    pub trigger_index_status: Option<&'static str>,
}
