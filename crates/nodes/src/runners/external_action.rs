//! `EXTERNAL_ACTION` runner family (`SLACK`, `GITHUB`, `GOOGLE_CALENDAR`,
//! `NOTION`, …).
//!
//! Dispatches on `configurations.action_type`, auto-filling a
//! subtype-appropriate default when the action type is absent. Slack is
//! the one provider with an in-scope HTTP-backed implementation
//! (deploy-time channel resolution is in scope); GitHub and the rest get
//! stub implementations since their parameter catalogs are out of scope.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{traits::ExecutionContext, ExecutableNode, NodeError};

fn default_action_for(subtype: &str) -> &'static str {
    match subtype {
        "SLACK" => "send_message",
        "GITHUB" => "create_issue",
        "GOOGLE_CALENDAR" => "create_event",
        "NOTION" => "create_page",
        _ => "default_action",
    }
}

/// Slack Web API surface this node needs: listing channels (deploy-time
/// resolution) and posting messages.
#[async_trait]
pub trait SlackClient: Send + Sync {
    async fn list_conversations(&self) -> Result<Value, NodeError>;
    async fn post_message(&self, channel: &str, text: &str, username: Option<&str>) -> Result<Value, NodeError>;
}

/// GitHub REST surface this node needs. Parameter catalogs for every
/// operation are out of scope; this trait covers only what `ExternalActionRunner`
/// calls.
#[async_trait]
pub trait GithubClient: Send + Sync {
    async fn create_issue(&self, repo: &str, title: &str, body: &str) -> Result<Value, NodeError>;
}

pub struct ExternalActionRunner {
    slack: Arc<dyn SlackClient>,
    github: Arc<dyn GithubClient>,
}

impl ExternalActionRunner {
    pub fn new(slack: Arc<dyn SlackClient>, github: Arc<dyn GithubClient>) -> Self {
        Self { slack, github }
    }
}

#[async_trait]
impl ExecutableNode for ExternalActionRunner {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let cfg = ctx.configurations.as_object().cloned().unwrap_or_default();
        let action_type = cfg
            .get("action_type")
            .and_then(Value::as_str)
            .unwrap_or_else(|| default_action_for(&ctx.subtype));

        let payload = inputs.as_object().cloned().unwrap_or_default();

        match (ctx.subtype.as_str(), action_type) {
            ("SLACK", "send_message") => {
                let channel = payload
                    .get("channel")
                    .and_then(Value::as_str)
                    .or_else(|| cfg.get("channel").and_then(Value::as_str))
                    .ok_or_else(|| NodeError::Fatal("slack send_message requires a channel".to_string()))?;
                let text = payload.get("text").and_then(Value::as_str).unwrap_or_default();
                let username = payload.get("username").and_then(Value::as_str);
                let result = self.slack.post_message(channel, text, username).await?;
                Ok(json!({ "main": result }))
            }
            ("SLACK", "list_channels") => {
                let result = self.slack.list_conversations().await?;
                Ok(json!({ "main": result }))
            }
            ("GITHUB", "create_issue") => {
                let repo = payload
                    .get("repo")
                    .and_then(Value::as_str)
                    .ok_or_else(|| NodeError::Fatal("github create_issue requires a repo".to_string()))?;
                let title = payload.get("title").and_then(Value::as_str).unwrap_or("untitled");
                let body = payload.get("body").and_then(Value::as_str).unwrap_or_default();
                let result = self.github.create_issue(repo, title, body).await?;
                Ok(json!({ "main": result }))
            }
            (subtype, action) => Err(NodeError::Fatal(format!(
                "unsupported external action: {subtype}/{action}"
            ))),
        }
    }
}
