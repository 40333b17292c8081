//! Session context
//!
//! [`Session`] is the single owner of "who is signed in". It is created once
//! at start-up, shared by cloning, and injected into the services and the
//! [`crate::client::ResumeClient`]. State changes are published on a
//! `tokio::sync::watch` channel so a consumer can route to sign-in as soon as
//! the session ends.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::token_store::TokenStore;
use crate::error::ApiResult;
use crate::models::AuthSession;

/// Observable authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No token is stored
    SignedOut,
    /// A token is stored and has not been rejected
    SignedIn(AuthSession),
    /// The server answered 401 to the stored token. The token stays
    /// persisted; there is no refresh flow, the user has to sign in again.
    Expired(AuthSession),
}

impl AuthState {
    /// True only for [`AuthState::SignedIn`].
    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthState::SignedIn(_))
    }

    /// The session carried by this state, if any.
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            AuthState::SignedOut => None,
            AuthState::SignedIn(s) | AuthState::Expired(s) => Some(s),
        }
    }
}

/// Shared session context.
#[derive(Debug, Clone)]
pub struct Session {
    tokens: TokenStore,
    state: Arc<watch::Sender<AuthState>>,
}

impl Session {
    /// Creates a signed-out session over `tokens`. Call [`Session::restore`]
    /// to pick up a persisted token.
    pub fn new(tokens: TokenStore) -> Self {
        let (tx, _rx) = watch::channel(AuthState::SignedOut);
        Self {
            tokens,
            state: Arc::new(tx),
        }
    }

    /// The underlying token store.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Reads the persisted token and publishes the resulting state.
    pub async fn restore(&self) -> AuthState {
        let state = match self.tokens.session().await {
            Some(session) => {
                debug!(token = %session.token_prefix(), "Restored persisted session");
                AuthState::SignedIn(session)
            }
            None => AuthState::SignedOut,
        };
        self.state.send_replace(state.clone());
        state
    }

    /// Persists a freshly authenticated session and publishes it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ApiError::Storage`] if the token cannot be
    /// written; the published state is left unchanged in that case.
    pub async fn establish(&self, session: AuthSession) -> ApiResult<()> {
        self.tokens.set(&session).await?;
        info!(email = session.email.as_deref().unwrap_or("-"), "Signed in");
        self.state.send_replace(AuthState::SignedIn(session));
        Ok(())
    }

    /// Clears the persisted session and notifies subscribers.
    ///
    /// Subscribers are notified even if clearing the backend fails, so the
    /// process never keeps acting as the previous user.
    pub async fn logout(&self) -> ApiResult<()> {
        let result = self.tokens.clear().await;
        self.state.send_replace(AuthState::SignedOut);
        info!("Signed out");
        result
    }

    /// Records that the server rejected the current token.
    ///
    /// Only a signed-in session moves to [`AuthState::Expired`]; other
    /// states are left alone.
    pub fn mark_expired(&self) {
        let changed = self.state.send_if_modified(|state| match state {
            AuthState::SignedIn(session) => {
                *state = AuthState::Expired(session.clone());
                true
            }
            _ => false,
        });
        if changed {
            warn!("Server rejected the session token; sign in again");
        }
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every future state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}
