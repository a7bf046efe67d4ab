//! `ACTION` runner family — in-workflow data shaping and bare HTTP calls.
//!
//! `ACTION` nodes do not call a named external provider (that is
//! `EXTERNAL_ACTION`'s job); they either reshape data with a declarative
//! [`crate::transform`] config or issue a plain HTTP request described by
//! `configurations`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::transform::{self, TransformConfig};
use crate::{traits::ExecutionContext, ExecutableNode, NodeError};

pub struct ActionRunner {
    http: Client,
}

impl Default for ActionRunner {
    fn default() -> Self {
        Self { http: Client::new() }
    }
}

impl ActionRunner {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

fn parse_transform_config(cfg: &Value) -> Option<TransformConfig> {
    let obj = cfg.as_object()?;
    match obj.get("transform")?.as_str()? {
        "extract_field" => Some(TransformConfig::ExtractField {
            field: obj.get("field").and_then(Value::as_str).unwrap_or("").to_string(),
            default: obj.get("default").cloned().unwrap_or(Value::Null),
        }),
        "create_object" => Some(TransformConfig::CreateObject {
            fields: obj.get("fields").and_then(Value::as_object).cloned().unwrap_or_default(),
        }),
        "pass_through" => Some(TransformConfig::PassThrough),
        _ => None,
    }
}

#[async_trait]
impl ExecutableNode for ActionRunner {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let cfg_obj = ctx.configurations.as_object().cloned().unwrap_or_default();

        if let Some(config) = parse_transform_config(&ctx.configurations) {
            return Ok(json!({ "main": transform::transform(&inputs, &config) }));
        }

        let url = cfg_obj
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Fatal("action node requires either a transform or a url".to_string()))?;
        let method = cfg_obj.get("method").and_then(Value::as_str).unwrap_or("POST").to_uppercase();

        let mut request = match method.as_str() {
            "GET" => self.http.get(url),
            "PUT" => self.http.put(url),
            "DELETE" => self.http.delete(url),
            _ => self.http.post(url),
        };

        if let Some(headers) = cfg_obj.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key, v);
                }
            }
        }

        if method != "GET" {
            request = request.json(&inputs);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::Retryable(format!("action http call failed: {e}")))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(NodeError::Retryable(format!("action http call returned {status}")));
        }

        Ok(json!({ "main": body }))
    }
}
