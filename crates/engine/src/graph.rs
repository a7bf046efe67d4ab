//! Graph validation and topological leveling (C5).
//!
//! Rules enforced:
//! 1. Node IDs are unique within the workflow.
//! 2. Every connection references valid node IDs on both ends.
//! 3. The directed graph (restricted to schedulable nodes) is acyclic.
//!
//! `MEMORY` nodes never reach the scheduler — they're attachments consumed
//! directly by their parent `AI_AGENT` node, not independent steps in the
//! execution order. [`schedulable_levels`] filters them out before running
//! Kahn's algorithm, and returns nodes grouped into topological *levels*
//! rather than one flat order, so same-level nodes can run concurrently
//! (spec.md §5).

use std::collections::{HashMap, HashSet, VecDeque};

use nodes::traits::NodeType;

use crate::models::Workflow;
use crate::EngineError;

/// Validate a workflow's structure without touching scheduling order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if a connection references a
///   missing node.
pub fn validate_structure(workflow: &Workflow) -> Result<(), EngineError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &workflow.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    let node_set: HashSet<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();

    for conn in &workflow.connections {
        if !node_set.contains(conn.from_node.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: conn.from_node.clone(),
                side: "from",
            });
        }
        if !node_set.contains(conn.to_node.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: conn.to_node.clone(),
                side: "to",
            });
        }
    }

    Ok(())
}

/// Node IDs that are attached as `MEMORY`/`TOOL` children of some other
/// node (i.e. listed in an `attached_nodes` array) and therefore never
/// independently scheduled.
fn attached_node_ids(workflow: &Workflow) -> HashSet<&str> {
    workflow
        .nodes
        .iter()
        .flat_map(|n| n.attached_nodes.iter().map(String::as_str))
        .collect()
}

/// Validate the workflow and return nodes grouped into topological
/// execution levels: `levels[0]` has no schedulable predecessors,
/// `levels[1]`'s predecessors are all in `levels[0]`, and so on. Nodes
/// within one level have no dependency on each other and may run
/// concurrently.
///
/// `MEMORY` nodes and any node listed in another node's `attached_nodes`
/// are excluded entirely — they are not part of the scheduled graph.
///
/// # Errors
/// Same as [`validate_structure`], plus [`EngineError::CycleDetected`] if
/// the schedulable subgraph is not acyclic.
pub fn schedulable_levels(workflow: &Workflow) -> Result<Vec<Vec<String>>, EngineError> {
    validate_structure(workflow)?;

    let attached = attached_node_ids(workflow);
    let schedulable: HashSet<&str> = workflow
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !attached.contains(id))
        .filter(|id| {
            workflow
                .nodes
                .iter()
                .find(|n| n.id == *id)
                .map(|n| n.node_type != NodeType::Memory)
                .unwrap_or(false)
        })
        .collect();

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for id in &schedulable {
        adjacency.entry(id).or_default();
        in_degree.entry(id).or_insert(0);
    }

    for conn in &workflow.connections {
        let (from, to) = (conn.from_node.as_str(), conn.to_node.as_str());
        if !schedulable.contains(from) || !schedulable.contains(to) {
            continue;
        }
        adjacency.entry(from).or_default().push(to);
        *in_degree.entry(to).or_insert(0) += 1;
    }

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut frontier: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0usize;

    while !frontier.is_empty() {
        let mut level: Vec<String> = frontier.iter().map(|s| s.to_string()).collect();
        level.sort();
        visited += level.len();

        let mut next_frontier: VecDeque<&str> = VecDeque::new();
        for &node_id in &frontier {
            if let Some(neighbours) = adjacency.get(node_id) {
                for &neighbour in neighbours {
                    let deg = in_degree.entry(neighbour).or_insert(0);
                    *deg -= 1;
                    if *deg == 0 {
                        next_frontier.push_back(neighbour);
                    }
                }
            }
        }

        levels.push(level);
        frontier = next_frontier;
    }

    if visited != schedulable.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Connection, Node, WorkflowMetadata, WorkflowSettings};
    use uuid::Uuid;

    fn node(id: &str, node_type: NodeType) -> Node {
        Node {
            id: id.to_string(),
            name: id.to_string(),
            node_type,
            subtype: "TEST".to_string(),
            configurations: serde_json::Value::Null,
            attached_nodes: vec![],
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

    fn workflow(nodes: Vec<Node>, connections: Vec<Connection>) -> Workflow {
        Workflow {
            id: Uuid::new_v4(),
            name: "test".into(),
            nodes,
            connections,
            settings: WorkflowSettings::default(),
            metadata: WorkflowMetadata::default(),
        }
    }

    #[test]
    fn linear_workflow_levels_each_have_one_node() {
        let wf = workflow(
            vec![
                node("a", NodeType::Trigger),
                node("b", NodeType::Action),
                node("c", NodeType::Action),
            ],
            vec![conn("a", "b"), conn("b", "c")],
        );
        let levels = schedulable_levels(&wf).expect("should be valid");
        assert_eq!(levels, vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]]);
    }

    #[test]
    fn diamond_workflow_groups_parallel_branches_in_one_level() {
        let wf = workflow(
            vec![
                node("a", NodeType::Trigger),
                node("b", NodeType::Action),
                node("c", NodeType::Action),
                node("d", NodeType::Action),
            ],
            vec![conn("a", "b"), conn("a", "c"), conn("b", "d"), conn("c", "d")],
        );
        let levels = schedulable_levels(&wf).expect("should be valid");
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[1], vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn memory_nodes_are_excluded_from_levels() {
        let mut agent = node("agent", NodeType::AiAgent);
        agent.attached_nodes = vec!["mem".to_string()];
        let wf = workflow(
            vec![node("trigger", NodeType::Trigger), agent, node("mem", NodeType::Memory)],
            vec![conn("trigger", "agent")],
        );
        let levels = schedulable_levels(&wf).expect("should be valid");
        let flat: Vec<&String> = levels.iter().flatten().collect();
        assert!(!flat.iter().any(|id| id.as_str() == "mem"));
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let wf = workflow(vec![node("a", NodeType::Trigger), node("a", NodeType::Action)], vec![]);
        assert!(matches!(schedulable_levels(&wf), Err(EngineError::DuplicateNodeId(id)) if id == "a"));
    }

    #[test]
    fn connection_referencing_missing_node_is_rejected() {
        let wf = workflow(vec![node("a", NodeType::Trigger)], vec![conn("a", "ghost")]);
        assert!(matches!(
            schedulable_levels(&wf),
            Err(EngineError::UnknownNodeReference { node_id, .. }) if node_id == "ghost"
        ));
    }

    #[test]
    fn cycle_is_detected() {
        let wf = workflow(
            vec![node("a", NodeType::Trigger), node("b", NodeType::Action), node("c", NodeType::Action)],
            vec![conn("a", "b"), conn("b", "c"), conn("c", "a")],
        );
        assert!(matches!(schedulable_levels(&wf), Err(EngineError::CycleDetected)));
    }

    #[test]
    fn single_node_no_connections_is_valid() {
        let wf = workflow(vec![node("solo", NodeType::Trigger)], vec![]);
        let levels = schedulable_levels(&wf).expect("single node should be valid");
        assert_eq!(levels, vec![vec!["solo".to_string()]]);
    }
}
