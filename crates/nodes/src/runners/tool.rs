//! `TOOL` runner family.
//!
//! A `TOOL` node is never scheduled directly by the graph: it is attached
//! to an `AI_AGENT` node and surfaced via `ExecutionContext.attached_outputs`
//! for that agent to invoke by name. This runner exists so a tool can
//! still be exercised standalone (tests, manual invocation) without a
//! parent agent.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{traits::ExecutionContext, ExecutableNode, NodeError};

/// Named tool-call boundary an `AI_AGENT` runner invokes through.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, tool_name: &str, arguments: &Value) -> Result<Value, NodeError>;
}

pub struct ToolRunner {
    invoker: Arc<dyn ToolInvoker>,
}

impl ToolRunner {
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl ExecutableNode for ToolRunner {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let tool_name = ctx
            .configurations
            .as_object()
            .and_then(|o| o.get("tool_name"))
            .and_then(Value::as_str)
            .unwrap_or(&ctx.subtype);

        let result = self.invoker.invoke(tool_name, &inputs).await?;
        Ok(json!({ "main": result }))
    }
}
