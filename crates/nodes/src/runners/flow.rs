//! Control-flow node family: `IF`, `SWITCH`, `WHILE`/`LOOP`, `MERGE`.
//!
//! Flow nodes differ from the rest of the node families in one respect:
//! they write to more than one named output port, and downstream
//! scheduling only honors ports that were actually written (an empty or
//! absent port means "this branch did not fire").

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{traits::ExecutionContext, ExecutableNode, NodeError};

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// `IF` — evaluates `configurations.condition_field` against the
/// assembled input and routes to `true`/`false` ports.
pub struct IfRunner;

#[async_trait]
impl ExecutableNode for IfRunner {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let field = ctx
            .configurations
            .as_object()
            .and_then(|o| o.get("condition_field"))
            .and_then(Value::as_str)
            .unwrap_or("condition");

        let condition = inputs
            .as_object()
            .and_then(|obj| obj.get(field))
            .cloned()
            .unwrap_or(Value::Null);

        if truthy(&condition) {
            Ok(json!({ "true": inputs }))
        } else {
            Ok(json!({ "false": inputs }))
        }
    }
}

/// `SWITCH` — routes to a port named after `configurations.switch_field`'s
/// value in the assembled input, falling back to `default`.
pub struct SwitchRunner;

#[async_trait]
impl ExecutableNode for SwitchRunner {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let field = ctx
            .configurations
            .as_object()
            .and_then(|o| o.get("switch_field"))
            .and_then(Value::as_str)
            .unwrap_or("case");

        let case = inputs
            .as_object()
            .and_then(|obj| obj.get(field))
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();

        Ok(json!({ case: inputs }))
    }
}

/// `WHILE`/`LOOP` — a single iteration step. `configurations.max_iterations`
/// bounds runaway loops; the engine drives repeated invocations by feeding
/// the `loop` port's output back as the next iteration's input.
pub struct WhileRunner;

#[async_trait]
impl ExecutableNode for WhileRunner {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let field = ctx
            .configurations
            .as_object()
            .and_then(|o| o.get("condition_field"))
            .and_then(Value::as_str)
            .unwrap_or("condition");

        let condition = inputs
            .as_object()
            .and_then(|obj| obj.get(field))
            .cloned()
            .unwrap_or(Value::Null);

        if truthy(&condition) {
            Ok(json!({ "loop": inputs }))
        } else {
            Ok(json!({ "done": inputs }))
        }
    }
}

/// `MERGE` — joins multiple upstream branches into one `main` output.
/// Input assembly already collapses multiple incoming connections into a
/// single value per port; this runner only needs to relabel it.
pub struct MergeRunner;

#[async_trait]
impl ExecutableNode for MergeRunner {
    async fn execute(&self, inputs: Value, _ctx: &ExecutionContext) -> Result<Value, NodeError> {
        Ok(json!({ "main": inputs }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn ctx(configurations: Value) -> ExecutionContext {
        ExecutionContext {
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            node_id: "flow1".to_string(),
            node_type: crate::traits::NodeType::Flow,
            subtype: "IF".to_string(),
            configurations,
            attached_outputs: HashMap::new(),
            secrets: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn if_runner_routes_true_branch() {
        let out = IfRunner
            .execute(json!({"condition": true}), &ctx(json!({})))
            .await
            .unwrap();
        assert!(out.get("true").is_some());
        assert!(out.get("false").is_none());
    }

    #[tokio::test]
    async fn switch_runner_falls_back_to_default() {
        let out = SwitchRunner
            .execute(json!({"other": 1}), &ctx(json!({"switch_field": "case"})))
            .await
            .unwrap();
        assert!(out.get("default").is_some());
    }
}
