//! `engine` crate — core domain models, graph validation, and the execution engine.

pub mod error;
pub mod executor;
pub mod graph;
pub mod logger;
pub mod models;
pub mod sanitize;

#[cfg(test)]
mod executor_tests;

pub use error::EngineError;
pub use executor::{ExecutionResult, ExecutorConfig, WorkflowExecutor};
pub use graph::schedulable_levels;
pub use models::{Connection, Node, Workflow, WorkflowMetadata, WorkflowSettings};
