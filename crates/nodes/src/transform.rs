//! Safe declarative data transformations for workflow connections.
//!
//! The legacy workflow format stored per-connection transforms as opaque
//! executable strings (`conversion_function`). Those strings are never
//! evaluated here. `parse_legacy_conversion_function` pattern-matches the
//! text into one of a fixed set of declarative [`TransformConfig`]s, and
//! [`transform`] applies the matched config. An unrecognized config type
//! always falls back to `pass_through`.

use serde_json::{json, Value};

/// One of the fixed, declarative transformation kinds a connection may
/// carry. This is the *only* form of per-edge logic permitted.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformConfig {
    AiInput {
        message: String,
        context: String,
    },
    AiOutput,
    SlackMessage {
        format: String,
        channel: String,
        username: String,
    },
    ExtractField {
        field: String,
        default: Value,
    },
    CreateObject {
        fields: serde_json::Map<String, Value>,
    },
    PassThrough,
}

/// Parse a legacy `conversion_function` string into a safe transform
/// config by content inspection. Mirrors the pattern table in
/// `spec.md` §4.6.5 exactly, including match order.
pub fn parse_legacy_conversion_function(conversion_function: &str) -> TransformConfig {
    if conversion_function.contains("Tell me a funny joke") {
        return TransformConfig::AiInput {
            message: "Tell me a funny joke".to_string(),
            context: "joke_generation".to_string(),
        };
    }

    let slack_markers = ["🎭", "#general", "JokeBot", "Slack"];
    if slack_markers.iter().any(|m| conversion_function.contains(m)) {
        return TransformConfig::SlackMessage {
            format: "🎭 {text} 🎭".to_string(),
            channel: "#general".to_string(),
            username: "JokeBot".to_string(),
        };
    }

    let output_markers = ["input_data.get('output')", "text", "message"];
    if output_markers.iter().any(|m| conversion_function.contains(m)) {
        return TransformConfig::AiOutput;
    }

    TransformConfig::PassThrough
}

/// Apply a transform config to a connection's source value.
pub fn transform(data: &Value, config: &TransformConfig) -> Value {
    match config {
        TransformConfig::AiInput { message, context } => json!({
            "user_input": message,
            "context": context,
        }),

        TransformConfig::AiOutput => {
            let text = match data.as_object() {
                Some(obj) => {
                    let direct = obj.get("output").and_then(Value::as_str);
                    match direct {
                        Some(s) if !s.is_empty() => s.to_string(),
                        _ => obj
                            .get("provider_result")
                            .and_then(Value::as_object)
                            .and_then(|pr| pr.get("response"))
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                    }
                }
                None => String::new(),
            };
            json!({ "text": text })
        }

        TransformConfig::SlackMessage { format, channel, username } => {
            let text = match data {
                Value::String(s) => s.clone(),
                Value::Object(obj) => obj
                    .get("text")
                    .or_else(|| obj.get("output"))
                    .or_else(|| obj.get("response"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                _ => String::new(),
            };
            let formatted = format.replace("{text}", &text);
            json!({
                "text": formatted,
                "channel": channel,
                "username": username,
                "action_type": "send_message",
            })
        }

        TransformConfig::ExtractField { field, default } => {
            if field.is_empty() {
                return data.clone();
            }
            let mut current = data;
            for segment in field.split('.') {
                match current.as_object().and_then(|obj| obj.get(segment)) {
                    Some(next) => current = next,
                    None => return default.clone(),
                }
            }
            current.clone()
        }

        TransformConfig::CreateObject { fields } => {
            let mut result = serde_json::Map::new();
            for (key, value_config) in fields {
                let resolved = match value_config {
                    Value::String(s) => Value::String(s.clone()),
                    Value::Object(obj) if obj.contains_key("from_input") => {
                        let path = obj.get("from_input").and_then(Value::as_str).unwrap_or("");
                        let default = obj.get("default").cloned().unwrap_or(Value::String(String::new()));
                        let mut current = data;
                        let mut found = true;
                        for segment in path.split('.') {
                            match current.as_object().and_then(|o| o.get(segment)) {
                                Some(next) => current = next,
                                None => {
                                    found = false;
                                    break;
                                }
                            }
                        }
                        if found {
                            current.clone()
                        } else {
                            default
                        }
                    }
                    other => other.clone(),
                };
                result.insert(key.clone(), resolved);
            }
            Value::Object(result)
        }

        TransformConfig::PassThrough => data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joke_prompt_pattern_is_recognized() {
        let config = parse_legacy_conversion_function("return 'Tell me a funny joke'");
        assert_eq!(
            config,
            TransformConfig::AiInput {
                message: "Tell me a funny joke".to_string(),
                context: "joke_generation".to_string(),
            }
        );
    }

    #[test]
    fn slack_pattern_is_recognized() {
        let config = parse_legacy_conversion_function("format for #general as JokeBot");
        assert_eq!(
            config,
            TransformConfig::SlackMessage {
                format: "🎭 {text} 🎭".to_string(),
                channel: "#general".to_string(),
                username: "JokeBot".to_string(),
            }
        );
    }

    #[test]
    fn unrecognized_text_falls_back_to_pass_through() {
        let config = parse_legacy_conversion_function("some unrelated legacy code");
        assert_eq!(config, TransformConfig::PassThrough);
    }

    #[test]
    fn pass_through_is_idempotent() {
        let data = json!({"a": 1, "nested": {"b": 2}});
        let once = transform(&data, &TransformConfig::PassThrough);
        let twice = transform(&once, &TransformConfig::PassThrough);
        assert_eq!(once, data);
        assert_eq!(twice, data);
    }

    #[test]
    fn ai_output_prefers_direct_output_over_provider_result() {
        let data = json!({"output": "direct", "provider_result": {"response": "nested"}});
        let result = transform(&data, &TransformConfig::AiOutput);
        assert_eq!(result, json!({"text": "direct"}));
    }

    #[test]
    fn ai_output_falls_back_to_provider_result() {
        let data = json!({"provider_result": {"response": "nested"}});
        let result = transform(&data, &TransformConfig::AiOutput);
        assert_eq!(result, json!({"text": "nested"}));
    }

    #[test]
    fn extract_field_walks_dotted_path() {
        let data = json!({"a": {"b": {"c": 42}}});
        let config = TransformConfig::ExtractField {
            field: "a.b.c".to_string(),
            default: Value::Null,
        };
        assert_eq!(transform(&data, &config), json!(42));
    }

    #[test]
    fn extract_field_missing_path_returns_default() {
        let data = json!({"a": 1});
        let config = TransformConfig::ExtractField {
            field: "a.b.c".to_string(),
            default: json!("fallback"),
        };
        assert_eq!(transform(&data, &config), json!("fallback"));
    }

    #[test]
    fn slack_message_extracts_text_from_nested_output() {
        let data = json!({"output": "a joke"});
        let config = TransformConfig::SlackMessage {
            format: "🎭 {text} 🎭".to_string(),
            channel: "#general".to_string(),
            username: "JokeBot".to_string(),
        };
        let result = transform(&data, &config);
        assert_eq!(
            result,
            json!({
                "text": "🎭 a joke 🎭",
                "channel": "#general",
                "username": "JokeBot",
                "action_type": "send_message",
            })
        );
    }
}
