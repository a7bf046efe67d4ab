//! Workflow execution engine (C6).
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Validates the graph and groups nodes into topological levels (C5).
//! 2. Runs each level's nodes concurrently, bounded by a semaphore sized
//!    to `settings.max_concurrent_nodes` — a deliberate redesign from
//!    strictly sequential execution (spec.md §5).
//! 3. Assembles each node's input from its predecessors' outputs, applying
//!    any declared connection transform.
//! 4. Builds a fresh [`ExecutionContext`] per node invocation.
//! 5. Persists a `node_executions` row per node and appends to the
//!    execution's log ring buffer.
//! 6. Honors `continue_on_failure` (node-level override, else workflow
//!    default, else stop) and per-node/workflow timeouts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use nodes::traits::{ExecutionContext, NodeType};
use nodes::{NodeError, NodeRegistry};

use crate::graph::schedulable_levels;
use crate::logger::{ExecutionLogger, LogLevel};
use crate::models::{Node, Workflow};
use crate::sanitize::sanitize;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Used when neither the node nor the workflow declares a timeout.
    pub default_node_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            default_node_timeout: Duration::from_secs(300),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution outcome
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    /// Outputs of every node that ran, keyed by node id.
    pub node_outputs: HashMap<String, Value>,
    pub failed_nodes: Vec<String>,
    /// Set when a `HUMAN_IN_THE_LOOP` node parked the execution instead of
    /// completing (spec.md §3/Open Question 4). No further levels are
    /// scheduled until `WorkflowExecutor::resume_node` is called.
    pub paused_node: Option<String>,
}

/// Reconstructed scheduling state for an execution that's resuming, built
/// from whatever `node_executions` rows were already persisted.
struct ResumeState {
    node_outputs: HashMap<String, Value>,
    pending_inputs: HashMap<String, PortInputs>,
    failed_nodes: Vec<String>,
}

/// Per-port values flowing into one node, assembled from its predecessors.
type PortInputs = HashMap<String, Value>;

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

pub struct WorkflowExecutor {
    pool: db::DbPool,
    registry: Arc<NodeRegistry>,
    logger: Arc<ExecutionLogger>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(pool: db::DbPool, registry: Arc<NodeRegistry>, logger: Arc<ExecutionLogger>, config: ExecutorConfig) -> Self {
        Self { pool, registry, logger, config }
    }

    /// Run a full workflow execution from a trigger payload.
    ///
    /// `workflow_version` and `secrets` are supplied by the caller
    /// (`scheduler`), which owns deployment bookkeeping and secret
    /// decryption respectively.
    #[instrument(skip(self, trigger_data, secrets), fields(workflow_id = %workflow.id))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        workflow_version: i32,
        trigger_data: Value,
        secrets: HashMap<String, String>,
    ) -> Result<ExecutionResult, EngineError> {
        let levels = schedulable_levels(workflow)?;
        info!(levels = levels.len(), "workflow graph validated");

        let exec_row = db::repository::executions::create_execution(
            &self.pool,
            workflow.id,
            workflow_version,
            trigger_data.clone(),
        )
        .await?;
        let execution_id = exec_row.id;

        db::repository::executions::update_execution_status(&self.pool, execution_id, "running", false).await?;

        let node_map = workflow.node_map();
        let mut pending_inputs: HashMap<String, PortInputs> = HashMap::new();

        // Seed trigger-type nodes' input with the raw trigger payload.
        for level in &levels {
            for node_id in level {
                if let Some(node) = node_map.get(node_id.as_str()) {
                    if node.node_type == NodeType::Trigger {
                        pending_inputs
                            .entry(node_id.clone())
                            .or_default()
                            .insert("main".to_string(), json_wrap_trigger(&trigger_data));
                    }
                }
            }
        }

        self.run_levels(
            workflow,
            execution_id,
            &node_map,
            &levels,
            HashMap::new(),
            pending_inputs,
            Vec::new(),
            secrets,
        )
        .await
    }

    /// Run a slice of already-validated topological levels, persisting
    /// node results and advancing execution status as it goes. Shared by
    /// [`Self::run`] (levels 0..N) and [`Self::resume_node`] (the levels
    /// after a parked `HUMAN_IN_THE_LOOP` node).
    #[allow(clippy::too_many_arguments)]
    async fn run_levels(
        &self,
        workflow: &Workflow,
        execution_id: Uuid,
        node_map: &HashMap<&str, &Node>,
        levels: &[Vec<String>],
        mut node_outputs: HashMap<String, Value>,
        mut pending_inputs: HashMap<String, PortInputs>,
        mut failed_nodes: Vec<String>,
        secrets: HashMap<String, String>,
    ) -> Result<ExecutionResult, EngineError> {
        let semaphore = Arc::new(Semaphore::new(workflow.settings.max_concurrent_nodes.max(1)));
        let mut skipped_nodes: std::collections::HashSet<String> = std::collections::HashSet::new();

        for level in levels {
            let mut handles = Vec::new();

            for node_id in level {
                if skipped_nodes.contains(node_id) {
                    continue;
                }

                let node = match node_map.get(node_id.as_str()) {
                    Some(n) => (*n).clone(),
                    None => continue,
                };

                let runner = match self.registry.get(node.node_type, &node.subtype) {
                    Some(r) => r.clone(),
                    None => {
                        return Err(EngineError::UnknownRunner {
                            node_id: node.id.clone(),
                            node_type: node.node_type,
                            subtype: node.subtype.clone(),
                        });
                    }
                };

                let inputs = assemble_inputs(pending_inputs.get(node_id));
                let attached_outputs = attached_outputs_for(&node, node_map);

                let ctx = ExecutionContext {
                    workflow_id: workflow.id,
                    execution_id,
                    node_id: node.id.clone(),
                    node_type: node.node_type,
                    subtype: node.subtype.clone(),
                    configurations: node.configurations.clone(),
                    attached_outputs,
                    secrets: secrets.clone(),
                };

                let timeout = node
                    .timeout_seconds
                    .or(workflow.settings.default_node_timeout_seconds)
                    .map(Duration::from_secs)
                    .unwrap_or(self.config.default_node_timeout);

                let permit = semaphore.clone();
                let pool = self.pool.clone();
                let logger = self.logger.clone();
                let cfg = self.config.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await.expect("semaphore closed");
                    let started_at = Utc::now();
                    let outcome = tokio::time::timeout(
                        timeout,
                        execute_with_retry(&node.id, runner.as_ref(), inputs.clone(), &ctx, &cfg),
                    )
                    .await;

                    let result = match outcome {
                        Ok(inner) => inner,
                        Err(_) => Err(EngineError::Timeout(node.id.clone())),
                    };

                    persist_node_result(&pool, &logger, execution_id, &node, &inputs, &result, started_at).await;

                    (node, result)
                }));
            }

            let mut paused_node: Option<String> = None;

            for handle in handles {
                let (node, result) = handle.await.expect("node task panicked");

                match result {
                    Ok(_output) if node.node_type == NodeType::HumanInTheLoop => {
                        info!(node_id = %node.id, "node parked awaiting human input");
                        paused_node.get_or_insert_with(|| node.id.clone());
                    }
                    Ok(output) => {
                        propagate(workflow, &node.id, &output, &mut pending_inputs);
                        node_outputs.insert(node.id.clone(), output);
                    }
                    Err(engine_err) => {
                        error!(node_id = %node.id, error = %engine_err, "node failed");
                        failed_nodes.push(node.id.clone());

                        let continue_on_failure = node.continue_on_failure.unwrap_or(workflow.settings.continue_on_failure);
                        if !continue_on_failure {
                            db::repository::executions::update_execution_status(&self.pool, execution_id, "error", true)
                                .await
                                .ok();
                            return Err(engine_err);
                        }

                        mark_downstream_skipped(workflow, &node.id, &mut skipped_nodes);
                    }
                }
            }

            if let Some(paused_node) = paused_node {
                db::repository::executions::update_execution_status(&self.pool, execution_id, "paused", false).await?;
                info!(execution_id = %execution_id, node_id = %paused_node, "execution paused for human input");
                return Ok(ExecutionResult { execution_id, node_outputs, failed_nodes, paused_node: Some(paused_node) });
            }
        }

        let final_status = if failed_nodes.is_empty() { "completed" } else { "error" };
        db::repository::executions::update_execution_status(&self.pool, execution_id, final_status, true).await?;

        info!(execution_id = %execution_id, failed = failed_nodes.len(), "workflow execution finished");

        Ok(ExecutionResult { execution_id, node_outputs, failed_nodes, paused_node: None })
    }

    /// Resume a parked `HUMAN_IN_THE_LOOP` node with externally-resolved
    /// input, re-entering the engine to schedule the levels after it
    /// (spec.md Open Question 4: "an external API that re-invokes the
    /// engine with the same execution_id and a resolved input for the HIL
    /// node").
    #[instrument(skip(self, resolved_input))]
    pub async fn resume_node(&self, execution_id: Uuid, node_id: &str, resolved_input: Value) -> Result<ExecutionResult, EngineError> {
        let exec_row = db::repository::executions::get_execution(&self.pool, execution_id).await?;
        if exec_row.status != "paused" {
            return Err(EngineError::NotPaused(execution_id));
        }

        let finished_at = Utc::now();
        let completed = db::repository::executions::complete_waiting_node(
            &self.pool,
            execution_id,
            node_id,
            sanitize(&resolved_input),
            finished_at,
        )
        .await?;
        if completed.is_none() {
            return Err(EngineError::NodeNotWaiting { execution_id, node_id: node_id.to_owned() });
        }

        let workflow_row = db::repository::workflows::get_workflow(&self.pool, exec_row.workflow_id).await?;
        let workflow: Workflow =
            serde_json::from_value(workflow_row.definition).map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;

        let levels = schedulable_levels(&workflow)?;
        let resume_level = levels
            .iter()
            .position(|level| level.iter().any(|id| id == node_id))
            .ok_or_else(|| EngineError::NodeNotWaiting { execution_id, node_id: node_id.to_owned() })?;

        let node_map = workflow.node_map();
        let state = self.reconstruct_resume_state(&workflow, execution_id, node_id, &resolved_input).await?;

        let secret_rows = db::repository::secrets::list_for_workflow(&self.pool, workflow.id).await?;
        let secrets: HashMap<String, String> =
            secret_rows.into_iter().map(|row| (row.key, row.encrypted_value)).collect();

        db::repository::executions::update_execution_status(&self.pool, execution_id, "running", false).await?;

        self.run_levels(
            &workflow,
            execution_id,
            &node_map,
            &levels[resume_level + 1..],
            state.node_outputs,
            state.pending_inputs,
            state.failed_nodes,
            secrets,
        )
        .await
    }

    /// Rebuild `node_outputs`/`pending_inputs`/`failed_nodes` from the
    /// `node_executions` rows already persisted for this execution, plus
    /// the just-resolved HIL output, so `run_levels` can continue exactly
    /// where the paused run left off.
    async fn reconstruct_resume_state(
        &self,
        workflow: &Workflow,
        execution_id: Uuid,
        resumed_node_id: &str,
        resolved_input: &Value,
    ) -> Result<ResumeState, EngineError> {
        let rows = db::repository::executions::list_node_executions(&self.pool, execution_id).await?;

        let mut node_outputs = HashMap::new();
        let mut failed_nodes = Vec::new();

        for row in &rows {
            match row.phase.as_str() {
                "COMPLETED" => {
                    node_outputs.insert(row.node_id.clone(), row.output_parameters.clone().unwrap_or(Value::Null));
                }
                "FAILED" | "TIMEOUT" => failed_nodes.push(row.node_id.clone()),
                _ => {}
            }
        }
        node_outputs.insert(resumed_node_id.to_string(), resolved_input.clone());

        let mut pending_inputs: HashMap<String, PortInputs> = HashMap::new();
        for (id, output) in &node_outputs {
            propagate(workflow, id, output, &mut pending_inputs);
        }

        Ok(ResumeState { node_outputs, pending_inputs, failed_nodes })
    }
}

fn json_wrap_trigger(data: &Value) -> Value {
    data.clone()
}

/// Flatten a node's assembled per-port inputs into the single JSON value
/// passed to `ExecutableNode::execute`.
fn assemble_inputs(ports: Option<&PortInputs>) -> Value {
    match ports {
        Some(p) if p.len() == 1 => p.values().next().cloned().unwrap_or(Value::Null),
        Some(p) => Value::Object(p.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        None => Value::Null,
    }
}

/// Resolve `AI_AGENT` attachment outputs from sibling `MEMORY`/`TOOL`
/// nodes. Those nodes are never scheduled, so their "output" is their own
/// static configuration.
fn attached_outputs_for(node: &Node, node_map: &HashMap<&str, &Node>) -> HashMap<String, Value> {
    node.attached_nodes
        .iter()
        .filter_map(|id| node_map.get(id.as_str()).map(|n| (id.clone(), n.configurations.clone())))
        .collect()
}

/// Push a completed node's output onto every downstream connection,
/// applying the connection's declared transform.
fn propagate(workflow: &Workflow, node_id: &str, output: &Value, pending_inputs: &mut HashMap<String, PortInputs>) {
    for conn in &workflow.connections {
        if conn.from_node != node_id {
            continue;
        }

        let port_value = output
            .as_object()
            .and_then(|o| o.get(&conn.from_port))
            .cloned();

        let Some(value) = port_value else { continue };

        let transformed = match &conn.conversion_function {
            Some(legacy) => {
                let config = nodes::transform::parse_legacy_conversion_function(legacy);
                nodes::transform::transform(&value, &config)
            }
            None => value,
        };

        pending_inputs
            .entry(conn.to_node.clone())
            .or_default()
            .insert(conn.to_port.clone(), transformed);
    }
}

/// When a node fails and the workflow continues anyway, its direct
/// successors that depend solely on its output have no input to run with;
/// mark them skipped rather than running them with a missing port.
fn mark_downstream_skipped(workflow: &Workflow, failed_node_id: &str, skipped: &mut std::collections::HashSet<String>) {
    for conn in &workflow.connections {
        if conn.from_node == failed_node_id {
            skipped.insert(conn.to_node.clone());
        }
    }
}

async fn execute_with_retry(
    node_id: &str,
    node: &dyn nodes::ExecutableNode,
    input: Value,
    ctx: &ExecutionContext,
    config: &ExecutorConfig,
) -> Result<Value, EngineError> {
    let mut attempts = 0u32;

    loop {
        match node.execute(input.clone(), ctx).await {
            Ok(output) => return Ok(output),

            Err(NodeError::Fatal(msg)) => {
                return Err(EngineError::NodeFatal { node_id: node_id.to_owned(), message: msg });
            }

            Err(NodeError::Auth(msg)) => {
                return Err(EngineError::NodeAuth { node_id: node_id.to_owned(), message: msg });
            }

            Err(NodeError::Retryable(msg)) => {
                attempts += 1;
                if attempts > config.max_retries {
                    return Err(EngineError::NodeRetryExhausted { node_id: node_id.to_owned(), message: msg });
                }

                let delay = config.retry_base_delay * 2u32.pow(attempts.saturating_sub(1));
                warn!(node_id, attempt = attempts, max = config.max_retries, ?delay, "retryable node error");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn persist_node_result(
    pool: &db::DbPool,
    logger: &ExecutionLogger,
    execution_id: Uuid,
    node: &Node,
    inputs: &Value,
    result: &Result<Value, EngineError>,
    started_at: chrono::DateTime<Utc>,
) {
    let finished_at = Some(Utc::now());
    let (phase, output, error_details) = match result {
        Ok(output) if node.node_type == NodeType::HumanInTheLoop => ("WAITING_HUMAN", Some(sanitize(output)), None),
        Ok(output) => ("COMPLETED", Some(sanitize(output)), None),
        Err(err @ EngineError::Timeout(_)) => ("TIMEOUT", None, Some(Value::String(err.to_string()))),
        Err(err) => ("FAILED", None, Some(Value::String(err.to_string()))),
    };

    let insert = db::repository::executions::insert_node_execution(
        pool,
        execution_id,
        &node.id,
        phase,
        sanitize(inputs),
        output,
        error_details.clone(),
        started_at,
        finished_at,
    )
    .await;

    if let Err(e) = insert {
        warn!(node_id = %node.id, error = %e, "failed to persist node execution");
    }

    let (level, message) = match result {
        Ok(_) if node.node_type == NodeType::HumanInTheLoop => {
            (LogLevel::Progress, format!("node '{}' is waiting for human input", node.id))
        }
        Ok(_) => (LogLevel::Info, format!("node '{}' succeeded", node.id)),
        Err(EngineError::Timeout(_)) => (LogLevel::Critical, format!("node '{}' timed out", node.id)),
        Err(e) => (LogLevel::Error, format!("node '{}' failed: {}", node.id, e)),
    };
    logger.log(execution_id, Some(node.id.clone()), level, message, error_details);
}
