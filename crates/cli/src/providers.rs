//! Concrete provider implementations the worker wires into the node
//! registry.
//!
//! Slack gets a real HTTP-backed client (deploy-time channel resolution
//! is in scope, spec.md §4.4.2 step 3). AI and GitHub providers are
//! stubs — their request/response shapes are part of the node subtype
//! parameter schema catalog, a Non-goal.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use nodes::runners::ai_agent::{AiProvider, AiRequest, AiResponse};
use nodes::runners::external_action::{GithubClient, SlackClient};
use nodes::runners::tool::ToolInvoker;
use nodes::NodeError;

pub struct SlackHttpClient {
    http: Client,
    bot_token: String,
}

impl SlackHttpClient {
    pub fn new(http: Client, bot_token: String) -> Self {
        Self { http, bot_token }
    }
}

#[async_trait]
impl SlackClient for SlackHttpClient {
    async fn list_conversations(&self) -> Result<Value, NodeError> {
        let resp = self
            .http
            .get("https://slack.com/api/conversations.list")
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(|e| NodeError::Retryable(e.to_string()))?;

        resp.json::<Value>().await.map_err(|e| NodeError::Retryable(e.to_string()))
    }

    async fn post_message(&self, channel: &str, text: &str, username: Option<&str>) -> Result<Value, NodeError> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(username) = username {
            body["username"] = json!(username);
        }

        let resp = self
            .http
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NodeError::Retryable(e.to_string()))?;

        let parsed: Value = resp.json().await.map_err(|e| NodeError::Retryable(e.to_string()))?;
        if parsed.get("ok").and_then(Value::as_bool) == Some(false) {
            let err = parsed.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
            return Err(NodeError::Fatal(format!("slack rejected message: {err}")));
        }
        Ok(parsed)
    }
}

/// GitHub issue creation shape is out of scope; this stub echoes the
/// request back so workflows can exercise the EXTERNAL_ACTION/GITHUB
/// wiring end to end without a live token.
pub struct StubGithubClient;

#[async_trait]
impl GithubClient for StubGithubClient {
    async fn create_issue(&self, repo: &str, title: &str, body: &str) -> Result<Value, NodeError> {
        Ok(json!({ "repo": repo, "title": title, "body": body, "number": 0, "html_url": null }))
    }
}

/// Prompt templates and per-model request shapes are out of scope; this
/// stub returns a fixed completion so AI_AGENT nodes are exercisable.
pub struct StubAiProvider;

#[async_trait]
impl AiProvider for StubAiProvider {
    async fn complete(&self, subtype: &str, request: &AiRequest) -> Result<AiResponse, NodeError> {
        Ok(AiResponse {
            content: format!("[{subtype}] stub response to: {}", request.user_input),
            metadata: json!({ "model": request.model }),
            prompt_tokens: request.user_input.len() as u32 / 4,
            completion_tokens: 8,
            function_calls: Value::Null,
        })
    }
}

/// Arbitrary tool invocation is out of scope beyond the dispatch
/// contract itself; this stub echoes its arguments.
pub struct StubToolInvoker;

#[async_trait]
impl ToolInvoker for StubToolInvoker {
    async fn invoke(&self, tool_name: &str, arguments: &Value) -> Result<Value, NodeError> {
        Ok(json!({ "tool": tool_name, "echoed_arguments": arguments }))
    }
}
