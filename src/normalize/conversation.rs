//! Wire payloads to conversation models

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::content::normalize_message_content;
use crate::error::{ApiError, ApiResult};
use crate::models::{derive_title, AiReply, ChatReply, Conversation, Message, Role};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: String,
    #[serde(default)]
    content: Value,
    role: Role,
    created_at: DateTime<Utc>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    pdf_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireConversation {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    last_message: Option<Value>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAiReply {
    #[serde(default)]
    is_generated: bool,
    #[serde(default)]
    html_code: Option<String>,
    #[serde(default)]
    pdf_url: Option<String>,
}

fn malformed(what: &str, err: serde_json::Error, raw: &Value) -> ApiError {
    ApiError::protocol(format!("malformed {} payload: {}", what, err), &raw.to_string())
}

fn into_message(wire: WireMessage, conversation_id: &str) -> Message {
    // User text is shown verbatim; only assistant output is unwrapped.
    let content = match wire.role {
        Role::Assistant => normalize_message_content(&wire.content),
        Role::User => match wire.content {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        },
    };

    Message {
        id: wire.id,
        content,
        role: wire.role,
        created_at: wire.created_at,
        conversation_id: wire
            .conversation_id
            .unwrap_or_else(|| conversation_id.to_string()),
        pdf_url: wire.pdf_url,
    }
}

fn into_conversation(wire: WireConversation) -> Conversation {
    let id = wire.id;
    let messages: Vec<Message> = wire
        .messages
        .into_iter()
        .map(|m| into_message(m, &id))
        .collect();

    let last_message = wire
        .last_message
        .as_ref()
        .map(normalize_message_content)
        .filter(|s| !s.is_empty())
        .or_else(|| messages.last().map(|m| m.content.clone()));

    let title = wire
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| derive_title(last_message.as_deref()));

    Conversation {
        title,
        last_message,
        created_at: wire.created_at,
        updated_at: wire.updated_at.unwrap_or(wire.created_at),
        messages,
        id,
    }
}

/// Normalizes a raw message array. Assistant content is unwrapped into plain
/// text; user content passes through untouched. Order is preserved.
///
/// # Errors
///
/// Returns [`ApiError::Protocol`] when the array does not decode.
pub fn normalize_message_list(raw: &Value, conversation_id: &str) -> ApiResult<Vec<Message>> {
    let wire: Vec<WireMessage> =
        serde_json::from_value(raw.clone()).map_err(|e| malformed("message list", e, raw))?;
    Ok(wire
        .into_iter()
        .map(|m| into_message(m, conversation_id))
        .collect())
}

/// Normalizes a single conversation payload.
///
/// Some backend versions answer `GET /chat/{id}` with a bare message array;
/// in that case a conversation is assembled around the messages using
/// `requested_id`.
///
/// # Errors
///
/// Returns [`ApiError::Protocol`] when the payload is neither shape, or
/// [`ApiError::Request`] with status 404 when it is `null`.
pub fn normalize_conversation(raw: &Value, requested_id: &str) -> ApiResult<Conversation> {
    match raw {
        Value::Null => Err(ApiError::Request {
            status: 404,
            message: format!("Conversation {} not found", requested_id),
        }),
        Value::Array(_) => {
            let messages = normalize_message_list(raw, requested_id)?;
            Ok(conversation_from_messages(requested_id, messages))
        }
        Value::Object(map) if !map.contains_key("createdAt") && map.contains_key("messages") => {
            let id = map.get("id").and_then(Value::as_str).unwrap_or(requested_id);
            let messages = normalize_message_list(&map["messages"], id)?;
            let mut conversation = conversation_from_messages(id, messages);
            if let Some(title) = map
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.trim().is_empty())
            {
                conversation.title = title.to_string();
            }
            Ok(conversation)
        }
        _ => {
            let mut patched = raw.clone();
            if let Value::Object(map) = &mut patched {
                map.entry("id")
                    .or_insert_with(|| Value::String(requested_id.to_string()));
            }
            let wire: WireConversation = serde_json::from_value(patched)
                .map_err(|e| malformed("conversation", e, raw))?;
            Ok(into_conversation(wire))
        }
    }
}

fn conversation_from_messages(id: &str, messages: Vec<Message>) -> Conversation {
    let created_at = messages
        .first()
        .map(|m| m.created_at)
        .unwrap_or_else(Utc::now);
    let updated_at = messages.last().map(|m| m.created_at).unwrap_or(created_at);
    let last_message = messages.last().map(|m| m.content.clone());

    Conversation {
        id: id.to_string(),
        title: derive_title(last_message.as_deref()),
        last_message,
        created_at,
        updated_at,
        messages,
    }
}

/// Normalizes the conversation list payload. `null` means an empty list.
///
/// # Errors
///
/// Returns [`ApiError::Protocol`] when the payload does not decode.
pub fn normalize_conversation_list(raw: &Value) -> ApiResult<Vec<Conversation>> {
    if raw.is_null() {
        return Ok(Vec::new());
    }
    let wire: Vec<WireConversation> = serde_json::from_value(raw.clone())
        .map_err(|e| malformed("conversation list", e, raw))?;
    Ok(wire.into_iter().map(into_conversation).collect())
}

/// Normalizes the payload of `POST /chat`.
///
/// The backend answers with either the updated conversation or just the
/// assistant reply. A payload carrying `messages`, or both `id` and
/// `createdAt`, is a conversation; anything else is a reply.
///
/// # Errors
///
/// Returns [`ApiError::Protocol`] when a conversation-shaped payload does not
/// decode.
pub fn normalize_chat_reply(raw: &Value) -> ApiResult<ChatReply> {
    let looks_like_conversation = raw.get("messages").map_or(false, Value::is_array)
        || (raw.get("id").is_some() && raw.get("createdAt").is_some());

    if looks_like_conversation {
        let wire: WireConversation =
            serde_json::from_value(raw.clone()).map_err(|e| malformed("conversation", e, raw))?;
        return Ok(ChatReply::Conversation(into_conversation(wire)));
    }

    let wire: WireAiReply = serde_json::from_value(raw.clone()).unwrap_or_default();
    Ok(ChatReply::Assistant(AiReply {
        is_generated: wire.is_generated,
        message: normalize_message_content(raw),
        html_code: wire.html_code,
        pdf_url: wire.pdf_url,
    }))
}
