//! Trigger index (C1) — extracting trigger specs from a workflow
//! definition and mirroring them into the `trigger_index` table.
//!
//! Node `configurations` values are sometimes "schema objects" —
//! `{"value": ..., "default": ...}` — left over from the authoring UI's
//! field-schema format rather than a bare scalar. [`configuration_value`]
//! unwraps that shape: prefer `value`, fall back to `default`, fall back
//! to a type-appropriate zero value (spec.md §4.4).

use engine::{Node, Workflow};
use nodes::traits::NodeType;
use serde_json::Value;

use crate::models::{TriggerSpec, TriggerType};

/// Unwrap a possibly-schema-object configuration field into its effective
/// value. `field` is read directly off `configurations` if present.
pub fn configuration_value(configurations: &Value, field: &str) -> Value {
    let raw = match configurations.as_object().and_then(|o| o.get(field)) {
        Some(v) => v,
        None => return Value::String(String::new()),
    };

    match raw.as_object() {
        Some(obj) if obj.contains_key("value") || obj.contains_key("default") => obj
            .get("value")
            .filter(|v| !v.is_null())
            .or_else(|| obj.get("default"))
            .cloned()
            .unwrap_or(Value::String(String::new())),
        _ => raw.clone(),
    }
}

fn configuration_str(configurations: &Value, field: &str) -> String {
    match configuration_value(configurations, field) {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Unwrap every schema-object field of a trigger node's `configurations`
/// before it's persisted as `trigger_config`. Detailed matching (§4.2.1,
/// §4.2.2) reads filter fields like `branches`/`author_filter` straight
/// off this value; leaving a schema shell (`{"value": [...], "default":
/// []}`) in place instead of the unwrapped array would silently break
/// every one of those filters (spec.md §9: "never propagate schema
/// shells downstream").
fn normalize_trigger_config(configurations: &Value) -> Value {
    let Some(obj) = configurations.as_object() else {
        return configurations.clone();
    };

    Value::Object(obj.keys().map(|field| (field.clone(), configuration_value(configurations, field))).collect())
}

fn trigger_type_for_subtype(subtype: &str) -> Option<TriggerType> {
    match subtype {
        "WEBHOOK" => Some(TriggerType::Webhook),
        "SLACK" => Some(TriggerType::Slack),
        "GITHUB" => Some(TriggerType::Github),
        "CRON" => Some(TriggerType::Cron),
        "MANUAL" => Some(TriggerType::Manual),
        _ => None,
    }
}

/// Extract every deployable trigger spec from a workflow's `TRIGGER` nodes.
/// A workflow may declare more than one trigger node; each becomes its own
/// `trigger_index` row.
pub fn extract_trigger_specs(workflow: &Workflow) -> Vec<TriggerSpec> {
    workflow
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Trigger)
        .filter_map(|node| trigger_spec_for_node(node))
        .collect()
}

fn trigger_spec_for_node(node: &Node) -> Option<TriggerSpec> {
    let trigger_type = trigger_type_for_subtype(&node.subtype)?;

    let index_key = match trigger_type {
        TriggerType::Webhook => configuration_str(&node.configurations, "path"),
        TriggerType::Slack => configuration_str(&node.configurations, "team_id"),
        // GitHub's empty index_key is never treated as an account-wide
        // wildcard (Open Question 5) — it is simply a repo this workflow
        // will never match against via the index.
        TriggerType::Github => configuration_str(&node.configurations, "repo_full_name"),
        TriggerType::Cron => configuration_str(&node.configurations, "expression"),
        TriggerType::Manual => String::new(),
    };

    Some(TriggerSpec {
        trigger_type,
        index_key,
        trigger_config: normalize_trigger_config(&node.configurations),
    })
}

/// Persist a workflow's trigger specs into the index, replacing whatever
/// was there before (used by both `deploy` and `update`).
pub async fn register(pool: &db::DbPool, workflow_id: uuid::Uuid, specs: &[TriggerSpec]) -> Result<(), db::DbError> {
    let rows: Vec<(String, String, Value)> = specs
        .iter()
        .map(|s| (s.trigger_type.as_str().to_string(), s.index_key.clone(), s.trigger_config.clone()))
        .collect();

    db::repository::trigger_index::register(pool, workflow_id, &rows).await
}

pub async fn unregister(pool: &db::DbPool, workflow_id: uuid::Uuid) -> Result<(), db::DbError> {
    db::repository::trigger_index::unregister(pool, workflow_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{WorkflowMetadata, WorkflowSettings};
    use serde_json::json;
    use uuid::Uuid;

    fn trigger_node(subtype: &str, configurations: Value) -> Node {
        Node {
            id: "trigger1".to_string(),
            name: "trigger1".to_string(),
            node_type: NodeType::Trigger,
            subtype: subtype.to_string(),
            configurations,
            attached_nodes: vec![],
            continue_on_failure: None,
            timeout_seconds: None,
        }
    }

    fn workflow_with(node: Node) -> Workflow {
        Workflow {
            id: Uuid::new_v4(),
            name: "wf".to_string(),
            nodes: vec![node],
            connections: vec![],
            settings: WorkflowSettings::default(),
            metadata: WorkflowMetadata::default(),
        }
    }

    #[test]
    fn unwraps_schema_object_preferring_value() {
        let cfg = json!({"path": {"value": "my-hook", "default": "fallback"}});
        assert_eq!(configuration_value(&cfg, "path"), json!("my-hook"));
    }

    #[test]
    fn unwraps_schema_object_falling_back_to_default() {
        let cfg = json!({"path": {"value": null, "default": "fallback"}});
        assert_eq!(configuration_value(&cfg, "path"), json!("fallback"));
    }

    #[test]
    fn bare_scalar_passes_through() {
        let cfg = json!({"path": "direct-value"});
        assert_eq!(configuration_value(&cfg, "path"), json!("direct-value"));
    }

    #[test]
    fn webhook_trigger_extracts_path_as_index_key() {
        let wf = workflow_with(trigger_node("WEBHOOK", json!({"path": "orders-hook"})));
        let specs = extract_trigger_specs(&wf);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].trigger_type, TriggerType::Webhook);
        assert_eq!(specs[0].index_key, "orders-hook");
    }

    #[test]
    fn github_trigger_with_empty_repo_keeps_empty_index_key() {
        let wf = workflow_with(trigger_node("GITHUB", json!({})));
        let specs = extract_trigger_specs(&wf);
        assert_eq!(specs[0].index_key, "");
    }

    #[test]
    fn trigger_config_unwraps_schema_object_filter_fields() {
        let wf = workflow_with(trigger_node(
            "GITHUB",
            json!({
                "repo_full_name": "acme/repo",
                "branches": {"value": ["main", "release/*"], "default": []},
            }),
        ));
        let specs = extract_trigger_specs(&wf);
        assert_eq!(specs[0].trigger_config.get("branches"), Some(&json!(["main", "release/*"])));
    }
}
