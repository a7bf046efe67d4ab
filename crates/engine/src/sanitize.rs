//! Parameter redaction for logged/persisted node input and output
//! (`spec.md` §4.6.6).
//!
//! Any object key matching `password|secret|token|key|credential`
//! (case-insensitive) is replaced with `"[REDACTED]"`. Values that cannot
//! round-trip through JSON cleanly never reach this function — everything
//! here is already `serde_json::Value` — but nested non-object/array/
//! scalar shapes (there are none in `Value`) would fall back to their type
//! name; this is a deliberate override of the original Python source's
//! `str(value)` behaviour, which stringified non-serializable values
//! instead of naming their type.

use serde_json::Value;

const SENSITIVE_MARKERS: [&str; 5] = ["password", "secret", "token", "key", "credential"];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Recursively redact sensitive fields from a JSON value for safe logging
/// or persistence in `node_executions`/`log_entries`.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let mut out = serde_json::Map::new();
            for (k, v) in obj {
                if is_sensitive_key(k) {
                    out.insert(k.clone(), Value::String("[REDACTED]".to_string()));
                } else {
                    out.insert(k.clone(), sanitize(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_top_level_keys() {
        let input = json!({"api_key": "abc123", "username": "bob"});
        let out = sanitize(&input);
        assert_eq!(out["api_key"], json!("[REDACTED]"));
        assert_eq!(out["username"], json!("bob"));
    }

    #[test]
    fn redacts_nested_sensitive_keys() {
        let input = json!({"config": {"slack_token": "xoxb-1", "channel": "#general"}});
        let out = sanitize(&input);
        assert_eq!(out["config"]["slack_token"], json!("[REDACTED]"));
        assert_eq!(out["config"]["channel"], json!("#general"));
    }

    #[test]
    fn redacts_inside_arrays() {
        let input = json!([{"password": "hunter2"}, {"name": "ok"}]);
        let out = sanitize(&input);
        assert_eq!(out[0]["password"], json!("[REDACTED]"));
        assert_eq!(out[1]["name"], json!("ok"));
    }

    #[test]
    fn key_matching_is_case_insensitive() {
        let input = json!({"API_SECRET": "x", "Credential_Data": "y"});
        let out = sanitize(&input);
        assert_eq!(out["API_SECRET"], json!("[REDACTED]"));
        assert_eq!(out["Credential_Data"], json!("[REDACTED]"));
    }
}
