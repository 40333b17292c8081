//! Test utilities for CVForge
//!
//! Builders for configurations and clients that point at a mock backend and
//! keep all state in memory.

use std::sync::Arc;

use crate::client::ResumeClient;
use crate::config::{Config, StorageBackend};
use crate::models::AuthSession;
use crate::storage::MemoryStore;

/// Base URL nothing listens on; requests to it fail fast.
pub const OFFLINE_BASE_URL: &str = "http://127.0.0.1:9";

/// Configuration pointing at `base_url` with in-memory storage and retries
/// that back off in milliseconds.
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.timeout_seconds = 2;
    config.storage.backend = StorageBackend::Memory;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config
}

/// Client over a fresh in-memory store, not signed in.
pub fn client(base_url: &str) -> ResumeClient {
    ResumeClient::new(&test_config(base_url), Arc::new(MemoryStore::new()))
        .expect("test client should build")
}

/// Client already holding `token`.
pub async fn signed_in_client(base_url: &str, token: &str) -> ResumeClient {
    let client = client(base_url);
    client
        .session()
        .establish(AuthSession::from_token(token))
        .await
        .expect("memory store accepts writes");
    client
}
