//! DB-backed integration tests for `WorkflowExecutor::run`/`resume_node`.
//!
//! Unlike `executor_tests.rs`, which drives `MockNode` directly against a
//! hand-assembled topological order to avoid a live database, these tests
//! go through the executor end to end: a workflow row is inserted, `run`
//! persists `workflow_executions`/`node_executions` as it schedules each
//! level, and the assertions read those rows back. This is the
//! cron-trigger → AI agent → Slack notification scenario from spec.md §2,
//! plus the human-in-the-loop pause/resume path from Open Question 4.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;

use engine::{Connection, ExecutorConfig, Node, Workflow, WorkflowExecutor};
use engine::logger::ExecutionLogger;
use nodes::mock::MockNode;
use nodes::traits::NodeType;
use nodes::NodeRegistry;

fn node(id: &str, node_type: NodeType, subtype: &str) -> Node {
    Node {
        id: id.to_string(),
        name: id.to_string(),
        node_type,
        subtype: subtype.to_string(),
        configurations: json!({}),
        attached_nodes: Vec::new(),
        continue_on_failure: None,
        timeout_seconds: None,
    }
}

fn conn(from: &str, to: &str) -> Connection {
    Connection {
        from_node: from.to_string(),
        from_port: "main".to_string(),
        to_node: to.to_string(),
        to_port: "main".to_string(),
        conversion_function: None,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn cron_trigger_through_ai_agent_to_slack_runs_to_completion(pool: PgPool) {
    let mut registry = NodeRegistry::new();
    registry.register(
        NodeType::Trigger,
        "CRON",
        Arc::new(MockNode::returning("cron", json!({"main": {"fired_at": "2026-08-01T00:00:00Z"}}))),
    );
    registry.register(
        NodeType::AiAgent,
        "OPENAI_CHATGPT",
        Arc::new(MockNode::returning("agent", json!({"main": {"reply": "looks good"}}))),
    );
    registry.register(
        NodeType::ExternalAction,
        "SLACK",
        Arc::new(MockNode::returning("slack", json!({"main": {"posted": true}}))),
    );

    let workflow = Workflow::new(
        "daily-standup-digest",
        vec![
            node("trigger", NodeType::Trigger, "CRON"),
            node("agent", NodeType::AiAgent, "OPENAI_CHATGPT"),
            node("notify", NodeType::ExternalAction, "SLACK"),
        ],
        vec![conn("trigger", "agent"), conn("agent", "notify")],
    );

    let workflow_row = db::repository::workflows::create_workflow(
        &pool,
        &workflow.name,
        serde_json::to_value(&workflow).unwrap(),
    )
    .await
    .unwrap();

    let mut workflow = workflow;
    workflow.id = workflow_row.id;
    db::repository::workflows::update_definition(&pool, workflow_row.id, serde_json::to_value(&workflow).unwrap())
        .await
        .unwrap();

    let executor = WorkflowExecutor::new(
        pool.clone(),
        Arc::new(registry),
        Arc::new(ExecutionLogger::default()),
        ExecutorConfig::default(),
    );

    let result = executor
        .run(&workflow, workflow_row.version, json!({"source": "cron"}), HashMap::new())
        .await
        .expect("run should complete");

    assert!(result.failed_nodes.is_empty());
    assert!(result.paused_node.is_none());
    assert_eq!(result.node_outputs.len(), 3);

    let exec_row = db::repository::executions::get_execution(&pool, result.execution_id).await.unwrap();
    assert_eq!(exec_row.status, "completed");
    assert!(exec_row.finished_at.is_some());

    let node_rows = db::repository::executions::list_node_executions(&pool, result.execution_id).await.unwrap();
    assert_eq!(node_rows.len(), 3);
    assert!(node_rows.iter().all(|row| row.phase == "COMPLETED"));

    let notify_row = node_rows.iter().find(|row| row.node_id == "notify").unwrap();
    assert_eq!(notify_row.input_parameters["reply"], json!("looks good"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn human_in_the_loop_node_pauses_then_resumes_to_completion(pool: PgPool) {
    let mut registry = NodeRegistry::new();
    registry.register(
        NodeType::Trigger,
        "MANUAL",
        Arc::new(MockNode::returning("trigger", json!({"main": {"requested_by": "ops"}}))),
    );
    registry.register(
        NodeType::HumanInTheLoop,
        "APPROVAL",
        Arc::new(MockNode::returning("approval", json!({"main": {"ignored": true}}))),
    );
    registry.register(
        NodeType::Action,
        "LOG",
        Arc::new(MockNode::returning("log", json!({"main": {"logged": true}}))),
    );

    let workflow = Workflow::new(
        "deploy-approval",
        vec![
            node("trigger", NodeType::Trigger, "MANUAL"),
            node("approval", NodeType::HumanInTheLoop, "APPROVAL"),
            node("log", NodeType::Action, "LOG"),
        ],
        vec![conn("trigger", "approval"), conn("approval", "log")],
    );

    let workflow_row = db::repository::workflows::create_workflow(
        &pool,
        &workflow.name,
        serde_json::to_value(&workflow).unwrap(),
    )
    .await
    .unwrap();

    let mut workflow = workflow;
    workflow.id = workflow_row.id;
    db::repository::workflows::update_definition(&pool, workflow_row.id, serde_json::to_value(&workflow).unwrap())
        .await
        .unwrap();

    let executor = WorkflowExecutor::new(
        pool.clone(),
        Arc::new(registry),
        Arc::new(ExecutionLogger::default()),
        ExecutorConfig::default(),
    );

    let paused = executor
        .run(&workflow, workflow_row.version, json!({"source": "manual"}), HashMap::new())
        .await
        .expect("run should pause, not error");

    assert_eq!(paused.paused_node.as_deref(), Some("approval"));
    assert!(paused.failed_nodes.is_empty());

    let exec_row = db::repository::executions::get_execution(&pool, paused.execution_id).await.unwrap();
    assert_eq!(exec_row.status, "paused");

    let node_rows = db::repository::executions::list_node_executions(&pool, paused.execution_id).await.unwrap();
    let approval_row = node_rows.iter().find(|row| row.node_id == "approval").unwrap();
    assert_eq!(approval_row.phase, "WAITING_HUMAN");

    let resumed = executor
        .resume_node(paused.execution_id, "approval", json!({"main": {"approved": true}}))
        .await
        .expect("resume should continue scheduling");

    assert!(resumed.failed_nodes.is_empty());
    assert!(resumed.paused_node.is_none());

    let exec_row = db::repository::executions::get_execution(&pool, resumed.execution_id).await.unwrap();
    assert_eq!(exec_row.status, "completed");

    let node_rows = db::repository::executions::list_node_executions(&pool, resumed.execution_id).await.unwrap();
    let approval_row = node_rows.iter().find(|row| row.node_id == "approval").unwrap();
    assert_eq!(approval_row.phase, "COMPLETED");
    let log_row = node_rows.iter().find(|row| row.node_id == "log").unwrap();
    assert_eq!(log_row.phase, "COMPLETED");
    assert_eq!(log_row.input_parameters["approved"], json!(true));
}
