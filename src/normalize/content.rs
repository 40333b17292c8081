//! Assistant message content extraction
//!
//! Assistant output reaches the client in several forms: an object with a
//! `message` field, a JSON document serialized into a string, or a JSON
//! document fenced in a ```` ```json ```` block inside prose. Whatever the
//! form, the display layer only ever receives plain text. Parsing failures
//! are not errors; the original string is returned.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Fields that carry display text, in priority order.
const TEXT_FIELDS: &[&str] = &["message", "content"];

fn fenced_json() -> &'static Regex {
    static FENCED_JSON: OnceLock<Regex> = OnceLock::new();
    // Constant pattern; cannot fail to compile.
    FENCED_JSON.get_or_init(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("valid regex"))
}

fn text_field(map: &Map<String, Value>) -> Option<String> {
    TEXT_FIELDS
        .iter()
        .filter_map(|key| map.get(*key))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract(parsed: &Value) -> Option<String> {
    parsed.as_object().and_then(text_field)
}

/// Normalizes a raw content value into display text.
///
/// # Examples
///
/// ```
/// use cvforge::normalize::normalize_message_content;
/// use serde_json::json;
///
/// assert_eq!(normalize_message_content(&json!("plain text")), "plain text");
/// assert_eq!(normalize_message_content(&json!({"message": "hi"})), "hi");
/// assert_eq!(
///     normalize_message_content(&json!("```json\n{\"message\":\"hi\"}\n```")),
///     "hi"
/// );
/// assert_eq!(normalize_message_content(&json!("{not json")), "{not json");
/// ```
pub fn normalize_message_content(raw: &Value) -> String {
    match raw {
        Value::String(s) => normalize_text(s),
        Value::Object(map) => text_field(map).unwrap_or_default(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Normalizes a string that may contain raw or fenced JSON.
pub fn normalize_text(text: &str) -> String {
    if let Some(caps) = fenced_json().captures(text) {
        return serde_json::from_str::<Value>(&caps[1])
            .ok()
            .and_then(|parsed| extract(&parsed))
            .unwrap_or_else(|| text.to_string());
    }

    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|parsed| extract(&parsed))
        .unwrap_or_else(|| text.to_string())
}
