//! `HUMAN_IN_THE_LOOP` runner.
//!
//! Execution of a HIL node does not resolve a value: it parks the node
//! and reports a `WAITING_HUMAN` signal, carrying an opaque token a human
//! (or an external system acting for one) must use to resume the run via
//! `engine::executor::resume_node`. Resumption is not an in-core state
//! transition (see spec.md Open Question 4) — this node never loops back
//! into itself.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{traits::ExecutionContext, ExecutableNode, NodeError};

pub struct HilRunner;

#[async_trait]
impl ExecutableNode for HilRunner {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let resume_token = Uuid::new_v4().to_string();
        tracing::info!(node_id = %ctx.node_id, %resume_token, "node waiting on human input");
        Ok(json!({
            "signal": "WAITING_HUMAN",
            "resume_token": resume_token,
            "pending_input": inputs,
        }))
    }
}
