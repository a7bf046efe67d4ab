//! `TRIGGER` runner — passthrough.
//!
//! A trigger node never has predecessors; its job is only to surface the
//! inbound trigger payload as the `main` output so downstream nodes can
//! consume it.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{traits::ExecutionContext, ExecutableNode, NodeError};

pub struct TriggerRunner;

#[async_trait]
impl ExecutableNode for TriggerRunner {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let trigger_data = inputs
            .as_object()
            .and_then(|o| o.get("trigger_data"))
            .cloned()
            .unwrap_or(inputs);

        tracing::debug!(node_id = %ctx.node_id, "trigger passthrough");
        Ok(json!({ "main": trigger_data }))
    }
}
