//! Response normalization
//!
//! The backend is inconsistent about where it puts the payload: list
//! endpoints answer with `data` or `conversations`, detail endpoints with
//! `data` or `conversation`, and assistant output may be an object, a JSON
//! string, or JSON fenced inside prose. Everything is reconciled here, once,
//! using explicit ordered alias lists instead of per-call-site guessing.
//!
//! - [`normalize_envelope`] -- one canonical `{success, data, message}` shape
//! - [`content`] -- assistant text extraction
//! - [`conversation`] -- wire payloads to [`crate::models`] types

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod content;
pub mod conversation;

pub use content::{normalize_message_content, normalize_text};
pub use conversation::{
    normalize_chat_reply, normalize_conversation, normalize_conversation_list,
    normalize_message_list,
};

/// Generic payload key, always tried first.
pub const DATA_KEY: &str = "data";

/// Accepted payload aliases per resource, in priority order after `data`.
pub mod aliases {
    /// `GET /chat`
    pub const CONVERSATION_LIST: &[&str] = &["conversations"];
    /// `GET /chat/{id}` and `POST /chat`
    pub const CONVERSATION: &[&str] = &["conversation"];
    /// Endpoints that only ever use `data`
    pub const NONE: &[&str] = &[];
}

/// Canonical response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `false` only when the server said so explicitly
    pub success: bool,
    /// The authoritative payload; `Null` when none was present
    pub data: Value,
    /// Server-provided message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// The envelope as a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "success": self.success,
            "data": self.data,
            "message": self.message,
        })
    }
}

/// Reconciles a raw response body into an [`Envelope`].
///
/// The payload is taken from `data` when present and non-null, otherwise from
/// the first alias in `aliases` that is present and non-null, otherwise
/// `Null`. A body that is not a JSON object is treated as a bare payload.
/// The function is idempotent: feeding its own output back in yields the
/// same envelope.
///
/// # Examples
///
/// ```
/// use cvforge::normalize::{aliases, normalize_envelope};
/// use serde_json::json;
///
/// let raw = json!({"success": true, "conversations": [{"id": "c1"}]});
/// let env = normalize_envelope(&raw, aliases::CONVERSATION_LIST);
/// assert_eq!(env.data, json!([{"id": "c1"}]));
/// assert_eq!(normalize_envelope(&env.to_value(), aliases::CONVERSATION_LIST), env);
/// ```
pub fn normalize_envelope(raw: &Value, aliases: &[&str]) -> Envelope {
    let Some(obj) = raw.as_object() else {
        return Envelope {
            success: true,
            data: raw.clone(),
            message: None,
        };
    };

    let data = std::iter::once(DATA_KEY)
        .chain(aliases.iter().copied())
        .filter_map(|key| obj.get(key))
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null);

    let success = !matches!(obj.get("success"), Some(Value::Bool(false)));

    let message = ["message", "error"]
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|v| v.as_str())
        .map(str::to_string);

    Envelope {
        success,
        data,
        message,
    }
}
