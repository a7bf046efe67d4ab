//! Event routing (C2) — matching an inbound trigger event against the
//! `trigger_index` to find the deployed workflows it should fire.
//!
//! Routing asymmetry is deliberate (spec.md §9 Open Questions 1 and 5):
//! - Slack: a row with an empty `index_key` matches *every* team, unioned
//!   with exact-team-id matches (workspace-wide app installs).
//! - GitHub: an empty `index_key` matches nothing extra — it is never
//!   treated as an account-wide wildcard, unlike Slack.
//! - GitHub push events honor a trigger's configured path filter; pull
//!   request events always pass regardless of path filter (fail-open,
//!   since a PR event carries no single diff path list to test).
//!
//! Detailed per-candidate matching (spec.md §4.2.1/§4.2.2) runs after the
//! fast `(trigger_type, index_key)` lookup and is fail-open: a malformed
//! `trigger_config` rejects nothing outright except where the spec calls
//! for a hard reject (signature verification happens upstream of this
//! module entirely, at the ingest boundary).

use db::models::TriggerIndexRowData;
use serde_json::Value;
use uuid::Uuid;

use crate::models::TriggerType;

/// Route an inbound webhook by its URL path and HTTP method.
pub async fn route_webhook(pool: &db::DbPool, path: &str, method: &str) -> Result<Vec<Uuid>, db::DbError> {
    let rows = db::repository::trigger_index::query(pool, TriggerType::Webhook.as_str(), path).await?;
    Ok(rows
        .into_iter()
        .filter(|row| matches_webhook_method(row, method))
        .map(|r| r.workflow_id)
        .collect())
}

fn matches_webhook_method(row: &TriggerIndexRowData, method: &str) -> bool {
    match row.trigger_config.get("allowed_methods").and_then(Value::as_array) {
        Some(methods) if !methods.is_empty() => methods
            .iter()
            .filter_map(Value::as_str)
            .any(|m| m.eq_ignore_ascii_case(method)),
        _ => true,
    }
}

/// Route an inbound GitHub delivery. `payload` is the full decoded event
/// body; the detailed validation in §4.2.1 reads branch, paths, actions,
/// and author straight out of it.
pub async fn route_github(pool: &db::DbPool, repo_full_name: &str, event_type: &str, payload: &Value) -> Result<Vec<Uuid>, db::DbError> {
    let rows = db::repository::trigger_index::query(pool, TriggerType::Github.as_str(), repo_full_name).await?;

    Ok(rows
        .into_iter()
        .filter(|row| matches_github(row, event_type, payload))
        .map(|r| r.workflow_id)
        .collect())
}

/// Route an inbound Slack event by workspace team id and Slack event
/// payload, unioning workspace-specific and wildcard (empty `index_key`)
/// registrations.
pub async fn route_slack(pool: &db::DbPool, team_id: &str, event_data: &Value) -> Result<Vec<Uuid>, db::DbError> {
    let mut rows = db::repository::trigger_index::query(pool, TriggerType::Slack.as_str(), team_id).await?;
    if !team_id.is_empty() {
        let wildcard = db::repository::trigger_index::query(pool, TriggerType::Slack.as_str(), "").await?;
        rows.extend(wildcard);
    }

    Ok(rows
        .into_iter()
        .filter(|row| matches_slack(row, event_data))
        .map(|r| r.workflow_id)
        .collect())
}

// ---------------------------------------------------------------------------
// GitHub detailed validation (spec.md §4.2.1)
// ---------------------------------------------------------------------------

fn matches_github(row: &TriggerIndexRowData, event_type: &str, payload: &Value) -> bool {
    matches_github_inner(row, event_type, payload).unwrap_or_else(|| {
        tracing::warn!(workflow_id = %row.workflow_id, event_type, "github trigger validation error, failing open");
        true
    })
}

/// Returns `None` on an unrecoverable shape mismatch so the caller can
/// fail open (step 6 of §4.2.1); `Some(bool)` is the actual verdict.
fn matches_github_inner(row: &TriggerIndexRowData, event_type: &str, payload: &Value) -> Option<bool> {
    if !matches_github_event_config(row, event_type, payload) {
        return Some(false);
    }
    if event_type == "pull_request" && !matches_github_pr_actions(row, payload) {
        return Some(false);
    }
    if !matches_github_branch(row, event_type, payload) {
        return Some(false);
    }
    if !matches_github_paths(row, event_type, payload) {
        return Some(false);
    }
    if !matches_github_author(row, payload) {
        return Some(false);
    }
    Some(true)
}

/// `event_config` is either an array of event-type names or a map of
/// event-type -> per-event config object. A missing/empty config rejects.
fn matches_github_event_config(row: &TriggerIndexRowData, event_type: &str, _payload: &Value) -> bool {
    match row.trigger_config.get("event_config") {
        Some(Value::Array(events)) => events.iter().filter_map(Value::as_str).any(|e| e == event_type),
        Some(Value::Object(map)) => map.contains_key(event_type),
        _ => false,
    }
}

fn matches_github_pr_actions(row: &TriggerIndexRowData, payload: &Value) -> bool {
    let Some(actions) = row
        .trigger_config
        .get("event_config")
        .and_then(|c| c.get("pull_request"))
        .and_then(|c| c.get("actions"))
        .and_then(Value::as_array)
    else {
        return true;
    };
    if actions.is_empty() {
        return true;
    }
    let action = payload.get("action").and_then(Value::as_str).unwrap_or("");
    actions.iter().filter_map(Value::as_str).any(|a| a == action)
}

fn matches_github_branch(row: &TriggerIndexRowData, event_type: &str, payload: &Value) -> bool {
    let Some(patterns) = row.trigger_config.get("branches").and_then(Value::as_array) else {
        return true;
    };
    if patterns.is_empty() {
        return true;
    }

    let branch = match event_type {
        "push" => payload.get("ref").and_then(Value::as_str).and_then(|r| r.strip_prefix("refs/heads/")).unwrap_or(""),
        "pull_request" => payload
            .get("pull_request")
            .and_then(|pr| pr.get("base"))
            .and_then(|b| b.get("ref"))
            .and_then(Value::as_str)
            .unwrap_or(""),
        _ => return true,
    };

    patterns.iter().filter_map(Value::as_str).any(|pattern| wildcard_match(pattern, branch))
}

fn matches_github_paths(row: &TriggerIndexRowData, event_type: &str, payload: &Value) -> bool {
    // §9 Open Question 1: the PR path filter is declared but the
    // implementation fails open for everything except `push`.
    if event_type != "push" {
        return true;
    }

    let Some(filters) = row.trigger_config.get("paths").and_then(Value::as_array) else {
        return true;
    };
    if filters.is_empty() {
        return true;
    }

    let patterns: Vec<&str> = filters.iter().filter_map(Value::as_str).collect();
    let changed = changed_paths_from_commits(payload);
    changed.iter().any(|p| patterns.iter().any(|pattern| wildcard_match(pattern, p)))
}

fn changed_paths_from_commits(payload: &Value) -> Vec<String> {
    let Some(commits) = payload.get("commits").and_then(Value::as_array) else {
        return Vec::new();
    };
    commits
        .iter()
        .flat_map(|commit| ["added", "removed", "modified"].iter().filter_map(move |field| commit.get(*field)))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn matches_github_author(row: &TriggerIndexRowData, payload: &Value) -> bool {
    let Some(pattern) = row.trigger_config.get("author_filter").and_then(Value::as_str) else {
        return true;
    };
    if pattern.is_empty() {
        return true;
    }
    let login = payload.get("sender").and_then(|s| s.get("login")).and_then(Value::as_str).unwrap_or("");
    wildcard_match(pattern, login)
}

// ---------------------------------------------------------------------------
// Slack detailed validation (spec.md §4.2.2)
// ---------------------------------------------------------------------------

fn matches_slack(row: &TriggerIndexRowData, payload: &Value) -> bool {
    let event_data = payload.get("event").cloned().unwrap_or(Value::Null);

    let event_type = event_data.get("type").and_then(Value::as_str).unwrap_or("");
    if !matches_slack_event_type(row, event_type) {
        return false;
    }
    if !matches_slack_channel(row, &event_data) {
        return false;
    }
    if !matches_slack_user(row, &event_data) {
        return false;
    }
    if !matches_slack_bot(row, &event_data) {
        return false;
    }
    if !matches_slack_mention(row, event_type, &event_data) {
        return false;
    }
    if !matches_slack_thread(row, &event_data) {
        return false;
    }
    if !matches_slack_command_prefix(row, event_type, &event_data) {
        return false;
    }
    true
}

fn matches_slack_event_type(row: &TriggerIndexRowData, event_type: &str) -> bool {
    match row.trigger_config.get("event_types").and_then(Value::as_array) {
        Some(types) if !types.is_empty() => types.iter().filter_map(Value::as_str).any(|t| t == event_type),
        // Default per spec.md §4.2.2 step 1.
        _ => event_type == "message" || event_type == "app_mention",
    }
}

fn matches_slack_channel(row: &TriggerIndexRowData, event_data: &Value) -> bool {
    let Some(pattern) = row.trigger_config.get("channel_filter").and_then(Value::as_str) else {
        return true;
    };
    if pattern.is_empty() {
        return true;
    }
    let channel = event_data.get("channel").and_then(Value::as_str).unwrap_or("");
    if pattern.starts_with('C') {
        pattern == channel
    } else {
        regex_lite_match(pattern, channel)
    }
}

fn matches_slack_user(row: &TriggerIndexRowData, event_data: &Value) -> bool {
    let Some(pattern) = row.trigger_config.get("user_filter").and_then(Value::as_str) else {
        return true;
    };
    if pattern.is_empty() {
        return true;
    }
    let user = event_data.get("user").and_then(Value::as_str).unwrap_or("");
    wildcard_match(pattern, user)
}

fn matches_slack_bot(row: &TriggerIndexRowData, event_data: &Value) -> bool {
    let ignore_bots = row.trigger_config.get("ignore_bots").and_then(Value::as_bool).unwrap_or(true);
    if !ignore_bots {
        return true;
    }
    event_data.get("bot_id").and_then(Value::as_str).map(|s| s.is_empty()).unwrap_or(true)
}

fn matches_slack_mention(row: &TriggerIndexRowData, event_type: &str, event_data: &Value) -> bool {
    let mention_required = row.trigger_config.get("mention_required").and_then(Value::as_bool).unwrap_or(false);
    if !mention_required {
        return true;
    }
    if event_type == "app_mention" {
        return true;
    }
    if event_data.get("text").and_then(Value::as_str).map(|t| t.contains("<@U")).unwrap_or(false) {
        return true;
    }
    rich_text_has_user_mention(event_data)
}

fn rich_text_has_user_mention(event_data: &Value) -> bool {
    let Some(blocks) = event_data.get("blocks").and_then(Value::as_array) else {
        return false;
    };
    blocks.iter().any(block_contains_user_element)
}

fn block_contains_user_element(block: &Value) -> bool {
    if block.get("type").and_then(Value::as_str) == Some("user") {
        return true;
    }
    match block {
        Value::Object(map) => map.values().any(block_contains_user_element),
        Value::Array(items) => items.iter().any(block_contains_user_element),
        _ => false,
    }
}

fn matches_slack_thread(row: &TriggerIndexRowData, event_data: &Value) -> bool {
    let require_thread = row.trigger_config.get("require_thread").and_then(Value::as_bool).unwrap_or(false);
    if !require_thread {
        return true;
    }
    event_data.get("thread_ts").and_then(Value::as_str).map(|s| !s.is_empty()).unwrap_or(false)
}

fn matches_slack_command_prefix(row: &TriggerIndexRowData, event_type: &str, event_data: &Value) -> bool {
    if event_type != "message" {
        return true;
    }
    let Some(prefix) = row.trigger_config.get("command_prefix").and_then(Value::as_str) else {
        return true;
    };
    if prefix.is_empty() {
        return true;
    }
    event_data.get("text").and_then(Value::as_str).unwrap_or("").trim_start().starts_with(prefix)
}

// ---------------------------------------------------------------------------
// Pattern helpers
// ---------------------------------------------------------------------------

/// Wildcard matching where `*` is the only special character (spec.md
/// §4.2.1 step 3 — "wildcard `*` only, no full regex").
fn wildcard_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let mut rest = value;

    for (i, seg) in segments.iter().enumerate() {
        if seg.is_empty() {
            continue;
        }
        if i == 0 {
            if !rest.starts_with(seg) {
                return false;
            }
            rest = &rest[seg.len()..];
        } else if i == segments.len() - 1 {
            return rest.ends_with(seg);
        } else {
            match rest.find(seg) {
                Some(pos) => rest = &rest[pos + seg.len()..],
                None => return false,
            }
        }
    }
    true
}

/// Slack channel filters that aren't a literal `C...` id are documented as
/// "a simple regex match" (spec.md §4.2.2 step 2). `regex` isn't in the
/// dependency stack for this crate, so a conservative substring/wildcard
/// fallback covers the common `^...$`/bare-name cases without pulling in a
/// new dependency for one field.
fn regex_lite_match(pattern: &str, value: &str) -> bool {
    let trimmed = pattern.trim_start_matches('^').trim_end_matches('$');
    if trimmed.contains('*') || trimmed.contains('.') {
        wildcard_match(&trimmed.replace(".*", "*"), value)
    } else {
        trimmed == value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(trigger_config: Value) -> TriggerIndexRowData {
        TriggerIndexRowData {
            id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            trigger_type: "GITHUB".to_string(),
            index_key: "acme/repo".to_string(),
            trigger_config,
            deployment_status: "active".to_string(),
        }
    }

    #[test]
    fn pull_request_event_ignores_path_filter() {
        let r = row(json!({"event_config": ["pull_request"], "paths": ["docs/*"]}));
        let payload = json!({"action": "opened"});
        assert!(matches_github_paths(&r, "pull_request", &payload));
    }

    #[test]
    fn push_event_honors_path_filter() {
        let r = row(json!({"event_config": ["push"], "paths": ["docs/*"]}));
        let with_src = json!({"commits": [{"added": [], "removed": [], "modified": ["src/main.rs"]}]});
        let with_docs = json!({"commits": [{"added": ["docs/readme.md"], "removed": [], "modified": []}]});
        assert!(!matches_github_paths(&r, "push", &with_src));
        assert!(matches_github_paths(&r, "push", &with_docs));
    }

    #[test]
    fn missing_path_filter_passes_every_push() {
        let r = row(json!({"event_config": ["push"]}));
        let payload = json!({"commits": [{"added": ["anything.txt"], "removed": [], "modified": []}]});
        assert!(matches_github_paths(&r, "push", &payload));
    }

    #[test]
    fn event_config_array_rejects_unlisted_events() {
        let r = row(json!({"event_config": ["push"]}));
        assert!(!matches_github_event_config(&r, "issues", &json!({})));
    }

    #[test]
    fn event_config_map_shape_is_accepted() {
        let r = row(json!({"event_config": {"push": {}}}));
        assert!(matches_github_event_config(&r, "push", &json!({})));
    }

    #[test]
    fn missing_event_config_rejects() {
        let r = row(json!({}));
        assert!(!matches_github_event_config(&r, "push", &json!({})));
    }

    #[test]
    fn branch_wildcard_matches_feature_prefix() {
        let r = row(json!({"branches": ["feature/*"]}));
        let push_feature = json!({"ref": "refs/heads/feature/x"});
        let push_main = json!({"ref": "refs/heads/main"});
        assert!(matches_github_branch(&r, "push", &push_feature));
        assert!(!matches_github_branch(&r, "push", &push_main));
    }

    #[test]
    fn branch_filter_main_only_rejects_feature_branch() {
        let r = row(json!({"branches": ["main"]}));
        let push_feature = json!({"ref": "refs/heads/feature/x"});
        assert!(!matches_github_branch(&r, "push", &push_feature));
    }

    #[test]
    fn author_filter_wildcard() {
        let r = row(json!({"author_filter": "dependabot*"}));
        let from_bot = json!({"sender": {"login": "dependabot[bot]"}});
        let from_human = json!({"sender": {"login": "alice"}});
        assert!(matches_github_author(&r, &from_bot));
        assert!(!matches_github_author(&r, &from_human));
    }

    #[test]
    fn pr_actions_filter() {
        let r = row(json!({"event_config": {"pull_request": {"actions": ["opened", "reopened"]}}}));
        assert!(matches_github_pr_actions(&r, &json!({"action": "opened"})));
        assert!(!matches_github_pr_actions(&r, &json!({"action": "closed"})));
    }

    fn slack_row(trigger_config: Value) -> TriggerIndexRowData {
        TriggerIndexRowData {
            id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            trigger_type: "SLACK".to_string(),
            index_key: "T123".to_string(),
            trigger_config,
            deployment_status: "active".to_string(),
        }
    }

    #[test]
    fn ignore_bots_default_true_rejects_bot_events() {
        let r = slack_row(json!({}));
        let event = json!({"type": "message", "bot_id": "B123", "text": "hi"});
        assert!(!matches_slack(&r, &json!({"event": event})));
    }

    #[test]
    fn mention_required_rejects_plain_message() {
        let r = slack_row(json!({"event_types": ["message", "app_mention"], "mention_required": true}));
        let plain = json!({"event": {"type": "message", "text": "hello"}});
        let mention = json!({"event": {"type": "app_mention", "text": "<@U123> hi"}});
        assert!(!matches_slack(&r, &plain));
        assert!(matches_slack(&r, &mention));
    }

    #[test]
    fn channel_literal_filter_requires_exact_id() {
        let r = slack_row(json!({"channel_filter": "C0ABC"}));
        let matching = json!({"event": {"type": "message", "channel": "C0ABC"}});
        let other = json!({"event": {"type": "message", "channel": "C0XYZ"}});
        assert!(matches_slack(&r, &matching));
        assert!(!matches_slack(&r, &other));
    }

    #[test]
    fn command_prefix_requires_leading_text() {
        let r = slack_row(json!({"command_prefix": "!deploy"}));
        let matching = json!({"event": {"type": "message", "text": "!deploy staging"}});
        let other = json!({"event": {"type": "message", "text": "hello"}});
        assert!(matches_slack(&r, &matching));
        assert!(!matches_slack(&r, &other));
    }

    #[test]
    fn require_thread_rejects_top_level_message() {
        let r = slack_row(json!({"require_thread": true}));
        let top_level = json!({"event": {"type": "message", "text": "hi"}});
        let in_thread = json!({"event": {"type": "message", "text": "hi", "thread_ts": "123.456"}});
        assert!(!matches_slack(&r, &top_level));
        assert!(matches_slack(&r, &in_thread));
    }

    #[test]
    fn webhook_method_filter() {
        let r = TriggerIndexRowData {
            id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            trigger_type: "WEBHOOK".to_string(),
            index_key: "/hooks/x".to_string(),
            trigger_config: json!({"allowed_methods": ["POST"]}),
            deployment_status: "active".to_string(),
        };
        assert!(matches_webhook_method(&r, "POST"));
        assert!(matches_webhook_method(&r, "post"));
        assert!(!matches_webhook_method(&r, "GET"));
    }
}
