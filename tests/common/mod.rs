//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use cvforge::client::ResumeClient;
use cvforge::config::{Config, StorageBackend};
use cvforge::models::AuthSession;
use cvforge::storage::MemoryStore;
use serde_json::{json, Value};
use wiremock::ResponseTemplate;

pub const TOKEN: &str = "test-token";

/// Configuration pointing at a mock server with in-memory storage and
/// millisecond retry backoff.
pub fn config_for(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.timeout_seconds = 5;
    config.storage.backend = StorageBackend::Memory;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config
}

pub fn client_for(base_url: &str) -> ResumeClient {
    ResumeClient::new(&config_for(base_url), Arc::new(MemoryStore::new()))
        .expect("client should build")
}

pub async fn signed_in_client(base_url: &str) -> ResumeClient {
    let client = client_for(base_url);
    client
        .session()
        .establish(AuthSession::from_token(TOKEN))
        .await
        .expect("memory store accepts writes");
    client
}

/// A JSON response with the given status.
pub fn json_response(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.to_string().into_bytes(), "application/json")
}

pub fn conversation_json(id: &str, updated_at: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Conversation {}", id),
        "createdAt": "2025-01-15T10:00:00.000Z",
        "updatedAt": updated_at,
        "messages": [
            {
                "id": format!("{}-m1", id),
                "content": "Help me with my resume",
                "role": "user",
                "createdAt": "2025-01-15T10:00:00.000Z",
                "conversationId": id
            }
        ]
    })
}

pub fn pdf_json(n: u32) -> Value {
    json!({
        "id": format!("pdf_{}", n),
        "createdAt": "2025-03-01T12:00:00.000Z",
        "title": format!("Resume {}", n),
        "pdfUrl": format!("https://cdn.example.com/{}.pdf", n),
        "imageUrl": null
    })
}
