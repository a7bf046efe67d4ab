//! Integration-style tests for node execution semantics.
//!
//! `WorkflowExecutor::run` calls straight into `sqlx` and needs a live
//! Postgres pool, so these tests exercise `MockNode` directly against a
//! hand-assembled topological order instead of going through the
//! executor — the same split the teacher's own test module used, with
//! DB-backed tests left for `tests/integration/`.

use std::collections::HashMap;
use serde_json::json;
use uuid::Uuid;

use crate::graph::schedulable_levels;
use crate::models::{Connection, Node, Workflow};
use nodes::mock::MockNode;
use nodes::traits::{ExecutionContext, NodeType};
use nodes::ExecutableNode;

fn node(id: &str) -> Node {
    Node {
        id: id.to_string(),
        name: id.to_string(),
        node_type: NodeType::Action,
        subtype: "mock".to_string(),
        configurations: json!({}),
        attached_nodes: Vec::new(),
        continue_on_failure: None,
        timeout_seconds: None,
    }
}

fn linear_workflow(ids: &[&str]) -> Workflow {
    let nodes = ids.iter().map(|id| node(id)).collect();
    let connections = ids
        .windows(2)
        .map(|w| Connection {
            from_node: w[0].to_string(),
            from_port: "main".to_string(),
            to_node: w[1].to_string(),
            to_port: "main".to_string(),
            conversion_function: None,
        })
        .collect();

    Workflow::new("test-linear", nodes, connections)
}

fn ctx(workflow_id: Uuid, node_id: &str) -> ExecutionContext {
    ExecutionContext {
        workflow_id,
        execution_id: Uuid::new_v4(),
        node_id: node_id.to_string(),
        node_type: NodeType::Action,
        subtype: "mock".to_string(),
        configurations: json!({}),
        attached_outputs: HashMap::new(),
        secrets: HashMap::new(),
    }
}

#[test]
fn linear_workflow_yields_one_node_per_level_in_order() {
    let wf = linear_workflow(&["step_a", "step_b", "step_c"]);
    let levels = schedulable_levels(&wf).expect("should be a valid DAG");
    assert_eq!(levels, vec![vec!["step_a"], vec!["step_b"], vec!["step_c"]]);
}

#[tokio::test]
async fn three_node_pipeline_output_propagation() {
    let wf = linear_workflow(&["node_a", "node_b", "node_c"]);
    let levels = schedulable_levels(&wf).expect("valid dag");

    let node_a = MockNode::returning("node_a", json!({ "step": 1 }));
    let node_b = MockNode::returning("node_b", json!({ "step": 2 }));
    let node_c = MockNode::returning("node_c", json!({ "step": 3 }));
    let registry: HashMap<&str, &MockNode> =
        [("node_a", &node_a), ("node_b", &node_b), ("node_c", &node_c)].into_iter().collect();

    let mut current_input = json!({ "origin": "trigger" });
    let mut execution_order: Vec<String> = Vec::new();

    for level in &levels {
        for node_id in level {
            let runner = registry[node_id.as_str()];
            let output = runner.execute(current_input.clone(), &ctx(wf.id, node_id)).await.expect("node should succeed");
            execution_order.push(node_id.clone());
            current_input = output;
        }
    }

    assert_eq!(execution_order, vec!["node_a", "node_b", "node_c"]);
    assert_eq!(node_a.call_count(), 1);
    assert_eq!(node_b.call_count(), 1);
    assert_eq!(node_c.call_count(), 1);
    assert_eq!(current_input["node"], "node_c");
    assert_eq!(current_input["step"], 3);
}

#[tokio::test]
async fn fatal_node_error_stops_pipeline() {
    let wf = linear_workflow(&["ok", "boom", "never"]);
    let levels = schedulable_levels(&wf).expect("valid dag");

    let ok = MockNode::returning("ok", json!({ "ok": true }));
    let boom = MockNode::failing_fatal("boom", "something broke irreparably");
    let never = MockNode::returning("never", json!({ "should": "not run" }));
    let registry: HashMap<&str, &dyn ExecutableNode> =
        [("ok", &ok as &dyn ExecutableNode), ("boom", &boom as &dyn ExecutableNode), ("never", &never as &dyn ExecutableNode)]
            .into_iter()
            .collect();

    let mut current_input = json!({});
    let mut hit_fatal = false;

    'levels: for level in &levels {
        for node_id in level {
            let runner = registry[node_id.as_str()];
            match runner.execute(current_input.clone(), &ctx(wf.id, node_id)).await {
                Ok(out) => current_input = out,
                Err(e) => {
                    assert_eq!(node_id, "boom");
                    assert!(matches!(e, nodes::NodeError::Fatal(_)));
                    hit_fatal = true;
                    break 'levels;
                }
            }
        }
    }

    assert!(hit_fatal, "expected a fatal error");
    assert_eq!(never.call_count(), 0);
}

#[tokio::test]
async fn retryable_node_error_is_returned_correctly() {
    let node = MockNode::failing_retryable("flaky", "transient failure");
    let result = node.execute(json!({}), &ctx(Uuid::new_v4(), "flaky")).await;
    assert!(matches!(result, Err(nodes::NodeError::Retryable(_))));
    assert_eq!(node.call_count(), 1);
}
