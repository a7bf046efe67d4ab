//! Core domain models for the workflow engine (C5's inputs, `spec.md` §3).
//!
//! These types are the source of truth for what a workflow looks like in
//! memory. They serialize to/from the JSONB `definition` column of the
//! `workflows` table. Trigger wiring (`TriggerType`, trigger specs) is a
//! `scheduler` concern, not an `engine` one — a `Node` of type `TRIGGER`
//! carries only its own configuration here; the scheduler is what extracts
//! a deployable trigger spec from it.

use std::collections::HashMap;

use nodes::traits::NodeType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within this workflow (referenced by connections).
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Discriminates the concrete runner within a `node_type` family, e.g.
    /// `OPENAI_CHATGPT`, `SLACK`, `IF`.
    pub subtype: String,
    /// Static configuration passed to the node at execution time.
    #[serde(default)]
    pub configurations: serde_json::Value,
    /// IDs of `MEMORY`/`TOOL` children attached to this node (only
    /// meaningful for `AI_AGENT` nodes). Attached nodes are excluded from
    /// the scheduled execution graph.
    #[serde(default)]
    pub attached_nodes: Vec<String>,
    /// Per-node override of the workflow-level `continue_on_failure`
    /// setting (spec.md Open Question 3 — node-level wins when present).
    #[serde(default)]
    pub continue_on_failure: Option<bool>,
    /// Per-node execution timeout in seconds, overriding the workflow default.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Directed edge from one node's output port to another's input port,
/// optionally carrying a declarative data transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub from_node: String,
    #[serde(default = "default_port")]
    pub from_port: String,
    pub to_node: String,
    #[serde(default = "default_port")]
    pub to_port: String,
    /// Legacy opaque transform string. Never evaluated — parsed into a
    /// [`nodes::transform::TransformConfig`] by pattern match.
    #[serde(default)]
    pub conversion_function: Option<String>,
}

fn default_port() -> String {
    "main".to_string()
}

// ---------------------------------------------------------------------------
// WorkflowSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Default behaviour when a node fails and has no per-node override.
    #[serde(default)]
    pub continue_on_failure: bool,
    /// Upper bound on nodes executing concurrently within one topological
    /// level (a redesign vs. strictly sequential execution — spec.md §5).
    #[serde(default = "default_max_concurrent_nodes")]
    pub max_concurrent_nodes: usize,
    /// Whole-workflow execution timeout in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Per-node default timeout in seconds, used when a node sets none.
    #[serde(default)]
    pub default_node_timeout_seconds: Option<u64>,
}

fn default_max_concurrent_nodes() -> usize {
    5
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            continue_on_failure: false,
            max_concurrent_nodes: default_max_concurrent_nodes(),
            timeout_seconds: None,
            default_node_timeout_seconds: None,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowMetadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow definition — the JSON payload stored in
/// `workflows.definition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub settings: WorkflowSettings,
    #[serde(default)]
    pub metadata: WorkflowMetadata,
}

impl Workflow {
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, connections: Vec<Connection>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes,
            connections,
            settings: WorkflowSettings::default(),
            metadata: WorkflowMetadata::default(),
        }
    }

    pub fn node_map(&self) -> HashMap<&str, &Node> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }
}
