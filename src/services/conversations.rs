//! Conversations service
//!
//! | Operation | Request |
//! |---|---|
//! | [`ConversationService::list_all`] | `GET /chat` |
//! | [`ConversationService::get_by_id`] | `GET /chat/{id}` |
//! | [`ConversationService::create_with_first_message`] | `POST /chat {message}` |
//! | [`ConversationService::send_message`] | `POST /chat {message, conversationId}` |
//!
//! Every operation reads the token first and fails with
//! [`crate::error::ApiError::Unauthenticated`] before any network I/O when none is stored.

use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{message_text, payload, ServiceBase};
use crate::auth::TokenStore;
use crate::error::ApiResult;
use crate::http::{endpoints, HttpClient};
use crate::models::{AiReply, ChatReply, Conversation};
use crate::normalize::{
    aliases, normalize_chat_reply, normalize_conversation, normalize_conversation_list,
};

/// Conversation resource service.
#[derive(Debug, Clone)]
pub struct ConversationService {
    base: ServiceBase,
}

impl ConversationService {
    /// Creates the service.
    pub fn new(http: HttpClient, tokens: TokenStore) -> Self {
        Self {
            base: ServiceBase { http, tokens },
        }
    }

    /// Fetches every conversation of the signed-in user.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> ApiResult<Vec<Conversation>> {
        let token = self.base.tokens.require().await?;
        let response = self.base.http.get(endpoints::CHAT, Some(&token)).await?;
        let data = payload(response, aliases::CONVERSATION_LIST, "Failed to fetch chats")?;
        let list = normalize_conversation_list(&data)?;
        debug!(count = list.len(), "Fetched conversation list");
        Ok(list)
    }

    /// Fetches one conversation with its messages.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: &str) -> ApiResult<Conversation> {
        let token = self.base.tokens.require().await?;
        endpoints::check_id("conversation", id)?;
        let response = self
            .base
            .http
            .get(&endpoints::conversation(id), Some(&token))
            .await?;
        let data = payload(response, aliases::CONVERSATION, "Failed to fetch messages")?;
        normalize_conversation(&data, id)
    }

    /// Starts a new conversation with its first message.
    ///
    /// The backend creates the conversation server-side and does not return
    /// its id; callers that need the id must list conversations afterwards
    /// (see [`crate::client::ResumeClient::create_conversation`]).
    #[instrument(skip(self, text))]
    pub async fn create_with_first_message(&self, text: &str) -> ApiResult<ChatReply> {
        let token = self.base.tokens.require().await?;
        let text = message_text(text)?;
        self.post_message(json!({ "message": text }), &token, "Failed to create chat")
            .await
    }

    /// Sends a message to an existing conversation.
    #[instrument(skip(self, text))]
    pub async fn send_message(&self, conversation_id: &str, text: &str) -> ApiResult<ChatReply> {
        let token = self.base.tokens.require().await?;
        endpoints::check_id("conversation", conversation_id)?;
        let text = message_text(text)?;
        self.post_message(
            json!({ "message": text, "conversationId": conversation_id }),
            &token,
            "Failed to send message",
        )
        .await
    }

    async fn post_message(&self, body: Value, token: &str, failure: &str) -> ApiResult<ChatReply> {
        let response = self.base.http.post(endpoints::CHAT, &body, Some(token)).await?;
        let data = payload(response, aliases::CONVERSATION, failure)?;
        let reply = reply_from_payload(&data)?;

        if let ChatReply::Assistant(ai) = &reply {
            debug!(generated = ai.is_generated, has_pdf = ai.pdf_url.is_some(), "Assistant replied");
        }
        Ok(reply)
    }
}

/// An envelope without a payload carries no assistant output. Its
/// `message` is server status text and is not shown as a reply.
fn reply_from_payload(data: &Value) -> ApiResult<ChatReply> {
    if data.is_null() {
        return Ok(ChatReply::Assistant(AiReply {
            is_generated: false,
            message: String::new(),
            html_code: None,
            pdf_url: None,
        }));
    }
    normalize_chat_reply(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::AuthSession;
    use crate::storage::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    // Port 9 is discard; nothing in these tests may reach it.
    fn service() -> (ConversationService, TokenStore) {
        let http = HttpClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
        (ConversationService::new(http, tokens.clone()), tokens)
    }

    #[tokio::test]
    async fn test_every_operation_requires_token() {
        let (svc, _) = service();
        assert_eq!(svc.list_all().await.unwrap_err(), ApiError::Unauthenticated);
        assert_eq!(svc.get_by_id("c1").await.unwrap_err(), ApiError::Unauthenticated);
        assert_eq!(
            svc.create_with_first_message("hi").await.unwrap_err(),
            ApiError::Unauthenticated
        );
        assert_eq!(
            svc.send_message("c1", "hi").await.unwrap_err(),
            ApiError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_blank_message_rejected_before_network() {
        let (svc, tokens) = service();
        tokens.set(&AuthSession::from_token("tok")).await.unwrap();
        let err = svc.send_message("c1", "   ").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_bad_id_rejected_before_network() {
        let (svc, tokens) = service();
        tokens.set(&AuthSession::from_token("tok")).await.unwrap();
        let err = svc.get_by_id("a/b").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_empty_payload_is_empty_reply() {
        let reply = reply_from_payload(&Value::Null).unwrap();
        match reply {
            ChatReply::Assistant(ai) => {
                assert!(ai.message.is_empty());
                assert!(!ai.is_generated);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_payload_reply_is_normalized() {
        let reply = reply_from_payload(&json!({"message": "Here you go"})).unwrap();
        assert_eq!(reply.assistant_text(), Some("Here you go"));
    }
}
