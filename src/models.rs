//! Domain types exchanged with the CVForge backend
//!
//! These are the normalized shapes handed to consumers. Raw wire payloads are
//! decoded into private structs in [`crate::normalize`] and converted here, so
//! a value of any type in this module has already passed normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title used when a conversation has neither a title nor a last message.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

const TITLE_WORDS: usize = 7;
const TITLE_MAX_CHARS: usize = 50;

/// The authenticated user's credential and identity fields.
///
/// Only the token store creates or destroys one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Opaque bearer token
    pub token: String,
    /// Backend user id, when the auth response included a user
    pub user_id: Option<String>,
    /// Display name
    pub display_name: Option<String>,
    /// Email address
    pub email: Option<String>,
}

impl AuthSession {
    /// Session holding only a token.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: None,
            display_name: None,
            email: None,
        }
    }

    /// First characters of the token, safe for debug logs.
    pub fn token_prefix(&self) -> String {
        let prefix: String = self.token.chars().take(6).collect();
        format!("{}…", prefix)
    }
}

/// Author of a message.
///
/// The backend labels assistant output `model`; both spellings decode to
/// [`Role::Assistant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Written by the signed-in user
    User,
    /// Written by the AI assistant
    #[serde(alias = "model")]
    Assistant,
}

/// A single chat message. `content` is always display-ready text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

/// A conversation with the assistant.
///
/// `messages` keeps server order (chronological); nothing in this crate
/// reorders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Case-insensitive match of `query` against the title or the last
    /// message. An empty query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self
                .last_message
                .as_deref()
                .map_or(false, |m| m.to_lowercase().contains(&needle))
    }
}

/// Conversations matching `query`, in list order.
pub fn filter_conversations<'a>(
    conversations: &'a [Conversation],
    query: &str,
) -> Vec<&'a Conversation> {
    conversations.iter().filter(|c| c.matches(query)).collect()
}

/// Derives a conversation title from its last message.
///
/// Takes the first seven words; anything longer than 50 characters is cut and
/// suffixed with `...`.
///
/// # Examples
///
/// ```
/// use cvforge::models::derive_title;
///
/// assert_eq!(derive_title(None), "New Chat");
/// assert_eq!(derive_title(Some("Build me a resume")), "Build me a resume");
/// ```
pub fn derive_title(last_message: Option<&str>) -> String {
    let Some(text) = last_message.map(str::trim).filter(|t| !t.is_empty()) else {
        return DEFAULT_CONVERSATION_TITLE.to_string();
    };

    let title = text
        .split_whitespace()
        .take(TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    if title.chars().count() > TITLE_MAX_CHARS {
        let cut: String = title.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        title
    }
}

/// Direct answer from the assistant when a send does not echo the
/// conversation back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReply {
    /// Whether a resume was generated in this turn
    pub is_generated: bool,
    /// Normalized display text
    pub message: String,
    /// Generated HTML, if any
    pub html_code: Option<String>,
    /// Rendered PDF location, if any
    pub pdf_url: Option<String>,
}

/// What the backend returned for a message send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    /// The updated conversation
    Conversation(Conversation),
    /// Only the assistant's reply
    Assistant(AiReply),
}

impl ChatReply {
    /// Display text of the newest assistant output, if any.
    pub fn assistant_text(&self) -> Option<&str> {
        match self {
            ChatReply::Assistant(reply) => Some(reply.message.as_str()),
            ChatReply::Conversation(conv) => conv
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::Assistant)
                .map(|m| m.content.as_str()),
        }
    }
}

/// Result of starting a new conversation.
///
/// The creation response carries no conversation id, so the id is learned
/// from a follow-up list fetch. `discovered` is the most recently updated
/// conversation in that list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedConversation {
    /// The backend's reply to the first message
    pub reply: ChatReply,
    /// The conversation found by the follow-up list fetch
    pub discovered: Option<Conversation>,
}

/// Pagination metadata. `page` is 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
}

/// One server-side page of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedCollection<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> PaginatedCollection<T> {
    /// True when later pages exist.
    pub fn has_next(&self) -> bool {
        self.meta.page < self.meta.total_pages
    }

    /// True when the requested page lies past the end of the collection.
    pub fn is_past_end(&self) -> bool {
        self.items.is_empty() && self.meta.page > self.meta.total_pages
    }
}

/// A generated resume PDF shown in the template gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub pdf_url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}
