//! `(NodeType, subtype) -> runner` lookup table (C7).
//!
//! A tagged-variant key over a flat map, per spec.md §9's "tagged variants
//! over inheritance" guidance — no runner inheritance hierarchy, just one
//! `ExecutableNode` impl per family registered under every subtype it
//! handles.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{traits::NodeType, ExecutableNode};

/// Lookup key: a node's declared type plus its subtype string.
pub type RunnerKey = (NodeType, String);

/// Maps `(node_type, subtype)` to a boxed runner implementation.
#[derive(Default, Clone)]
pub struct NodeRegistry {
    runners: HashMap<RunnerKey, Arc<dyn ExecutableNode>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a runner for a single `(type, subtype)` pair.
    pub fn register(&mut self, node_type: NodeType, subtype: impl Into<String>, runner: Arc<dyn ExecutableNode>) {
        self.runners.insert((node_type, subtype.into()), runner);
    }

    /// Register the same runner under several subtypes of one type
    /// (e.g. a single `ExternalActionRunner` handling `SLACK`, `GITHUB`, …).
    pub fn register_many(
        &mut self,
        node_type: NodeType,
        subtypes: impl IntoIterator<Item = &'static str>,
        runner: Arc<dyn ExecutableNode>,
    ) {
        for subtype in subtypes {
            self.runners.insert((node_type, subtype.to_string()), runner.clone());
        }
    }

    pub fn get(&self, node_type: NodeType, subtype: &str) -> Option<&Arc<dyn ExecutableNode>> {
        self.runners.get(&(node_type, subtype.to_string()))
    }
}
