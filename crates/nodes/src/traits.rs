//! The `ExecutableNode` trait and the per-node execution context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::NodeError;

/// The eight node categories a workflow graph is built from (`spec.md` §3).
///
/// `MEMORY` nodes never reach a runner — they are filtered out of the
/// execution graph and accessed directly by `AI_AGENT` runners via
/// `attached_nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Trigger,
    AiAgent,
    Action,
    ExternalAction,
    Flow,
    HumanInTheLoop,
    Tool,
    Memory,
}

/// Context passed to a single node invocation.
///
/// One `ExecutionContext` is built per node per run — it carries both the
/// run-wide identifiers and the node's own static configuration, so a
/// runner never needs to reach back into the workflow definition.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the parent workflow.
    pub workflow_id: Uuid,
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// ID of the node being executed.
    pub node_id: String,
    /// This node's declared type.
    pub node_type: NodeType,
    /// This node's declared subtype (e.g. `OPENAI_CHATGPT`, `SLACK`, `IF`).
    pub subtype: String,
    /// Static, deployment-time configuration for this node.
    pub configurations: Value,
    /// Outputs of this node's attached children (MEMORY/TOOL), keyed by
    /// attached node id. Populated only for `AI_AGENT` nodes.
    pub attached_outputs: HashMap<String, Value>,
    /// Decrypted secrets scoped to this workflow.
    pub secrets: HashMap<String, String>,
}

/// The core node trait.
///
/// All built-in runners implement this. `inputs` is the assembled
/// per-input-port object for this node (see the engine's input assembly
/// step); the returned value is the node's raw result, which the engine
/// normalizes into an `outputs` map (wrapping a bare `main` key when the
/// runner didn't produce one itself).
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    async fn execute(&self, inputs: Value, ctx: &ExecutionContext) -> Result<Value, NodeError>;
}
