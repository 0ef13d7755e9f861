//! Bounded structural dumps of envelopes the classifier could not use.

use {
    serde_json::{Map, Value, json},
    stickerbot_config::DiagnosticsConfig,
};

use crate::unwrap::UnwrappedMessage;

/// Render the outer, effective and inner messages as pretty JSON, cut at
/// `dump_depth` levels, `dump_max_array` items per array and
/// `dump_max_chars` characters overall.
#[must_use]
pub fn envelope_dump(unwrapped: &UnwrappedMessage<'_>, limits: &DiagnosticsConfig) -> String {
    let value = json!({
        "outer": to_value(unwrapped.outer),
        "msg": to_value(unwrapped.message),
        "inner": to_value(unwrapped.inner),
    });
    let bounded = bound(&value, limits.dump_depth, limits.dump_max_array);
    let text = serde_json::to_string_pretty(&bounded).unwrap_or_else(|e| format!("<{e}>"));
    truncate_chars(text, limits.dump_max_chars)
}

fn to_value(message: &stickerbot_protocol::Message) -> Value {
    serde_json::to_value(message).unwrap_or_else(|e| Value::String(format!("<{e}>")))
}

/// Copy `value`, replacing containers below `depth` with a placeholder and
/// cutting arrays to `max_array` items.
fn bound(value: &Value, depth: usize, max_array: usize) -> Value {
    match value {
        Value::Object(map) if depth == 0 => {
            if map.is_empty() {
                Value::Object(Map::new())
            } else {
                Value::String("[Object]".into())
            }
        },
        Value::Array(items) if depth == 0 => {
            if items.is_empty() {
                Value::Array(Vec::new())
            } else {
                Value::String("[Array]".into())
            }
        },
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), bound(v, depth - 1, max_array)))
                .collect(),
        ),
        Value::Array(items) => {
            let mut out: Vec<Value> = items
                .iter()
                .take(max_array)
                .map(|v| bound(v, depth - 1, max_array))
                .collect();
            if items.len() > max_array {
                out.push(Value::String(format!(
                    "... {} more items",
                    items.len() - max_array
                )));
            }
            Value::Array(out)
        },
        scalar => scalar.clone(),
    }
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        let dropped = text[cut..].chars().count();
        text.truncate(cut);
        text.push_str(&format!("\n... ({dropped} more chars)"));
    }
    text
}
