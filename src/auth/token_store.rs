//! Bearer token persistence
//!
//! [`TokenStore`] keeps the session token and the identity fields that travel
//! with it in a [`KeyValueStore`]. Reads never fail: a backend that cannot be
//! read is logged and treated as holding no token, so an unreadable keyring
//! degrades to "signed out" rather than an error screen.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::AuthSession;
use crate::storage::KeyValueStore;

/// Key of the bearer token.
pub const TOKEN_KEY: &str = "authToken";
/// Key of the backend user id.
pub const USER_ID_KEY: &str = "userId";
/// Key of the display name.
pub const USER_NAME_KEY: &str = "userName";
/// Key of the email address.
pub const USER_EMAIL_KEY: &str = "userEmail";

const IDENTITY_KEYS: [&str; 3] = [USER_ID_KEY, USER_NAME_KEY, USER_EMAIL_KEY];

/// Persistent holder of the current [`AuthSession`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cvforge::auth::TokenStore;
/// use cvforge::models::AuthSession;
/// use cvforge::storage::MemoryStore;
///
/// # async fn example() -> cvforge::error::ApiResult<()> {
/// let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
/// tokens.set(&AuthSession::from_token("tok_123")).await?;
/// assert_eq!(tokens.get().await.as_deref(), Some("tok_123"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    /// Wraps a key-value backend.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the stored token, or `None` when absent or unreadable.
    pub async fn get(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY).await {
            Ok(Some(token)) if !token.is_empty() => Some(token),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read session token, treating as signed out");
                None
            }
        }
    }

    /// Returns the token, or [`ApiError::Unauthenticated`] without touching
    /// the network.
    pub async fn require(&self) -> ApiResult<String> {
        self.get().await.ok_or(ApiError::Unauthenticated)
    }

    /// Reads the full session: token plus whatever identity fields exist.
    pub async fn session(&self) -> Option<AuthSession> {
        let token = self.get().await?;
        Some(AuthSession {
            token,
            user_id: self.read_optional(USER_ID_KEY).await,
            display_name: self.read_optional(USER_NAME_KEY).await,
            email: self.read_optional(USER_EMAIL_KEY).await,
        })
    }

    async fn read_optional(&self, key: &str) -> Option<String> {
        self.store.get(key).await.ok().flatten()
    }

    /// Persists `session`, replacing any previous one.
    ///
    /// Identity fields absent from `session` are removed so a previous user's
    /// name cannot outlive their token. The token is written in the same
    /// batch as the identity fields, after them.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Storage`] if the backend rejects the write.
    pub async fn set(&self, session: &AuthSession) -> ApiResult<()> {
        let fields = [
            (USER_ID_KEY, session.user_id.as_deref()),
            (USER_NAME_KEY, session.display_name.as_deref()),
            (USER_EMAIL_KEY, session.email.as_deref()),
        ];

        let stale: Vec<&str> = fields
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        if !stale.is_empty() {
            self.store
                .remove_many(&stale)
                .await
                .map_err(|e| ApiError::Storage(e.to_string()))?;
        }

        let mut entries: Vec<(&str, &str)> = fields
            .iter()
            .filter_map(|(k, v)| v.map(|v| (*k, v)))
            .collect();
        entries.push((TOKEN_KEY, session.token.as_str()));

        self.store
            .set_many(&entries)
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;

        debug!(token = %session.token_prefix(), "Stored session token");
        Ok(())
    }

    /// Removes the token and every identity field.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Storage`] if the backend rejects the removal.
    pub async fn clear(&self) -> ApiResult<()> {
        let mut keys = vec![TOKEN_KEY];
        keys.extend(IDENTITY_KEYS);
        self.store
            .remove_many(&keys)
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        debug!("Cleared session token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::storage::MemoryStore;

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStore::new()))
    }

    fn full_session() -> AuthSession {
        AuthSession {
            token: "tok_abc".to_string(),
            user_id: Some("u1".to_string()),
            display_name: Some("Sam".to_string()),
            email: Some("sam@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn test_get_empty_store_is_none() {
        assert!(store().get().await.is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_is_stable() {
        let tokens = store();
        tokens.set(&full_session()).await.unwrap();
        assert_eq!(tokens.get().await.as_deref(), Some("tok_abc"));
        assert_eq!(tokens.get().await.as_deref(), Some("tok_abc"));
        assert_eq!(tokens.session().await, Some(full_session()));
    }

    #[tokio::test]
    async fn test_set_removes_identity_of_previous_user() {
        let tokens = store();
        tokens.set(&full_session()).await.unwrap();
        tokens.set(&AuthSession::from_token("tok_2")).await.unwrap();

        let session = tokens.session().await.unwrap();
        assert_eq!(session.token, "tok_2");
        assert!(session.display_name.is_none());
        assert!(session.email.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let tokens = store();
        tokens.set(&full_session()).await.unwrap();
        tokens.clear().await.unwrap();
        assert!(tokens.get().await.is_none());
        assert!(tokens.session().await.is_none());
    }

    #[tokio::test]
    async fn test_require_without_token_is_unauthenticated() {
        assert_eq!(store().require().await, Err(ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_empty_token_counts_as_absent() {
        let backend = MemoryStore::with_entries(&[(TOKEN_KEY, "")]);
        let tokens = TokenStore::new(Arc::new(backend));
        assert!(tokens.get().await.is_none());
    }

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait::async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("backend unavailable")
        }
        async fn set_many(&self, _entries: &[(&str, &str)]) -> Result<()> {
            anyhow::bail!("backend unavailable")
        }
        async fn remove_many(&self, _keys: &[&str]) -> Result<()> {
            anyhow::bail!("backend unavailable")
        }
    }

    #[tokio::test]
    async fn test_read_failure_is_absent_not_error() {
        let tokens = TokenStore::new(Arc::new(BrokenStore));
        assert!(tokens.get().await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_storage_error() {
        let tokens = TokenStore::new(Arc::new(BrokenStore));
        let err = tokens.set(&full_session()).await.unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
    }
}
