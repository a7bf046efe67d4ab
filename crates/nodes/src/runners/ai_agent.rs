//! `AI_AGENT` runner family (`OPENAI_CHATGPT`, `ANTHROPIC_CLAUDE`,
//! `GOOGLE_GEMINI`).
//!
//! Building the exact provider request/response shape per subtype and the
//! prompt-template catalog are out of scope (node subtype parameter
//! schema catalog, Non-goal). This runner owns the generic contract:
//! assemble a request from `configurations` + assembled inputs, call the
//! injected [`AiProvider`], normalize the response, and surface attached
//! TOOL/MEMORY children by id.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{traits::ExecutionContext, ExecutableNode, NodeError};

/// A single request to an AI provider, built from a node's
/// `configurations` plus its assembled input.
#[derive(Debug, Clone)]
pub struct AiRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_input: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub function_calling: bool,
    pub safety_settings: Value,
}

/// Normalized provider response.
#[derive(Debug, Clone)]
pub struct AiResponse {
    pub content: String,
    pub metadata: Value,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub function_calls: Value,
}

/// The external collaborator boundary for AI model calls — a thin
/// adapter over whichever provider SDK `subtype` selects.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn complete(&self, subtype: &str, request: &AiRequest) -> Result<AiResponse, NodeError>;
}

pub struct AiAgentRunner {
    provider: Arc<dyn AiProvider>,
}

impl AiAgentRunner {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self { provider }
    }
}

fn extract_user_input(inputs: &Value) -> String {
    match inputs.as_object() {
        Some(obj) => obj
            .get("user_input")
            .or_else(|| obj.get("main"))
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| Some(v.to_string())))
            .unwrap_or_default(),
        None => inputs.to_string(),
    }
}

#[async_trait]
impl ExecutableNode for AiAgentRunner {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let cfg = ctx.configurations.as_object().cloned().unwrap_or_default();

        let request = AiRequest {
            model: cfg.get("model").and_then(Value::as_str).unwrap_or("default").to_string(),
            system_prompt: cfg.get("system_prompt").and_then(Value::as_str).unwrap_or("").to_string(),
            user_input: extract_user_input(&inputs),
            temperature: cfg.get("temperature").and_then(Value::as_f64).unwrap_or(0.7),
            max_tokens: cfg.get("max_tokens").and_then(Value::as_u64).unwrap_or(1024) as u32,
            function_calling: cfg.get("function_calling").and_then(Value::as_bool).unwrap_or(false),
            safety_settings: cfg.get("safety_settings").cloned().unwrap_or(Value::Null),
        };

        let response = self.provider.complete(&ctx.subtype, &request).await?;

        Ok(json!({
            "main": {
                "output": response.content,
                "content": response.content,
            },
            "metadata": response.metadata,
            "token_usage": {
                "prompt_tokens": response.prompt_tokens,
                "completion_tokens": response.completion_tokens,
            },
            "function_calls": response.function_calls,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    struct EchoProvider;

    #[async_trait]
    impl AiProvider for EchoProvider {
        async fn complete(&self, _subtype: &str, request: &AiRequest) -> Result<AiResponse, NodeError> {
            Ok(AiResponse {
                content: format!("echo: {}", request.user_input),
                metadata: json!({}),
                prompt_tokens: 1,
                completion_tokens: 1,
                function_calls: Value::Null,
            })
        }
    }

    fn ctx(configurations: Value) -> ExecutionContext {
        ExecutionContext {
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            node_id: "ai1".to_string(),
            node_type: crate::traits::NodeType::AiAgent,
            subtype: "OPENAI_CHATGPT".to_string(),
            configurations,
            attached_outputs: HashMap::new(),
            secrets: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn wraps_provider_response_under_main() {
        let runner = AiAgentRunner::new(Arc::new(EchoProvider));
        let out = runner
            .execute(json!({"user_input": "Tell a joke"}), &ctx(json!({"model": "gpt"})))
            .await
            .unwrap();
        assert_eq!(out["main"]["output"], json!("echo: Tell a joke"));
    }
}
