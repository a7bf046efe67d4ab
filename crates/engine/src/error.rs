//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// A connection references a node ID that doesn't exist in the workflow.
    #[error("connection references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference { node_id: String, side: &'static str },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    /// A stored workflow definition no longer deserializes into `Workflow`.
    #[error("stored workflow definition is not valid: {0}")]
    InvalidDefinition(String),

    // ------ Execution errors ------

    /// No runner is registered for a node's `(type, subtype)` pair.
    #[error("no runner registered for node '{node_id}' ({node_type:?}/{subtype})")]
    UnknownRunner {
        node_id: String,
        node_type: nodes::traits::NodeType,
        subtype: String,
    },

    /// A node failed with a fatal error; the whole execution is aborted.
    #[error("node '{node_id}' failed fatally: {message}")]
    NodeFatal { node_id: String, message: String },

    /// A node's retryable error was exhausted.
    #[error("node '{node_id}' exceeded retry limit: {message}")]
    NodeRetryExhausted { node_id: String, message: String },

    /// A node raised a non-retryable auth error.
    #[error("node '{node_id}' auth error: {message}")]
    NodeAuth { node_id: String, message: String },

    /// A node or the whole workflow exceeded its execution timeout.
    #[error("execution timed out: {0}")]
    Timeout(String),

    /// The execution was canceled externally.
    #[error("execution canceled: {0}")]
    Canceled(String),

    /// `resume_node` was called against an execution that isn't parked
    /// waiting for human input.
    #[error("execution '{0}' is not paused")]
    NotPaused(uuid::Uuid),

    /// `resume_node` was called for a node with no `WAITING_HUMAN` row.
    #[error("node '{node_id}' in execution '{execution_id}' is not waiting for input")]
    NodeNotWaiting { execution_id: uuid::Uuid, node_id: String },

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
