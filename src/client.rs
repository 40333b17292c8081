//! The consumer-facing facade
//!
//! [`ResumeClient`] wires the token store, session, services and query cache
//! together. Consumers declare what they need (a list, a conversation, a page
//! of templates) and get normalized data back; they never see the HTTP
//! client. Reads go through the cache; mutations go straight to the services
//! and then invalidate the entries they affect:
//!
//! | Mutation | Invalidates |
//! |---|---|
//! | [`ResumeClient::send_message`] | `conversation(id)`, `conversation list` |
//! | [`ResumeClient::create_conversation`] | `conversation list` |

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::{AuthService, AuthState, Session, TokenStore};
use crate::config::Config;
use crate::error::{ApiError, ApiResult, Result};
use crate::http::{endpoints, HttpClient};
use crate::models::{
    AuthSession, ChatReply, Conversation, CreatedConversation, PaginatedCollection, PdfItem,
};
use crate::query::{QueryClient, QueryKey, QueryObserver};
use crate::services::{ConversationService, TemplateService};
use crate::storage::{open_store, KeyValueStore};

/// What the connection probe learned about the configured server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered with JSON (any status)
    Json { status: u16 },
    /// The server answered, but not with JSON
    NotJson { message: String, snippet: String },
    /// No answer at all
    Unreachable(String),
}

/// Result of [`ResumeClient::probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub url: String,
    pub outcome: ProbeOutcome,
}

/// Entry point for consumers.
///
/// # Examples
///
/// ```no_run
/// use cvforge::client::ResumeClient;
/// use cvforge::config::Config;
///
/// # async fn example() -> cvforge::error::Result<()> {
/// let client = ResumeClient::from_config(&Config::default())?;
/// client.init().await;
/// client.login("sam@example.com", "hunter2").await?;
/// for conversation in client.conversations().await?.iter() {
///     println!("{}: {}", conversation.id, conversation.title);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResumeClient {
    http: HttpClient,
    session: Session,
    auth: AuthService,
    conversations: ConversationService,
    templates: TemplateService,
    query: QueryClient,
}

/// Marks the session expired when the server rejected the token.
fn expire_on_401<T>(session: &Session, result: ApiResult<T>) -> ApiResult<T> {
    if let Err(e) = &result {
        if e.is_unauthorized() {
            session.mark_expired();
        }
    }
    result
}

impl ResumeClient {
    /// Builds a client over an already opened key-value store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built from `config`.
    pub fn new(config: &Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let http = HttpClient::from_config(&config.api)?;
        let tokens = TokenStore::new(store);
        let session = Session::new(tokens.clone());
        Ok(Self {
            auth: AuthService::new(http.clone(), session.clone()),
            conversations: ConversationService::new(http.clone(), tokens.clone()),
            templates: TemplateService::new(http.clone(), tokens),
            query: QueryClient::new(config.cache.policy(), config.retry.policy()),
            http,
            session,
        })
    }

    /// Builds a client, opening the storage backend named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(&config.storage)?;
        Self::new(config, store)
    }

    /// Restores the persisted session. Call once at start-up.
    pub async fn init(&self) -> AuthState {
        self.session.restore().await
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn query(&self) -> &QueryClient {
        &self.query
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// Signs in. Anything cached for a previous user is dropped first.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthSession> {
        self.query.clear();
        self.auth.login(email, password).await
    }

    /// Creates an account and signs in.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> ApiResult<AuthSession> {
        self.query.clear();
        self.auth.signup(name, email, password).await
    }

    /// Clears the token, every cache entry, and notifies session subscribers.
    pub async fn logout(&self) -> ApiResult<()> {
        self.query.clear();
        self.session.logout().await
    }

    /// The persisted session, if any.
    pub async fn whoami(&self) -> Option<AuthSession> {
        self.session.tokens().session().await
    }

    // -----------------------------------------------------------------------
    // Conversations
    // -----------------------------------------------------------------------

    fn list_fetcher(
        &self,
    ) -> impl Fn() -> BoxFuture<'static, ApiResult<Vec<Conversation>>> + Send + Sync + 'static {
        let service = self.conversations.clone();
        let session = self.session.clone();
        move || {
            let service = service.clone();
            let session = session.clone();
            async move { expire_on_401(&session, service.list_all().await) }.boxed()
        }
    }

    fn detail_fetcher(
        &self,
        id: &str,
    ) -> impl Fn() -> BoxFuture<'static, ApiResult<Conversation>> + Send + Sync + 'static {
        let service = self.conversations.clone();
        let session = self.session.clone();
        let id = id.to_string();
        move || {
            let service = service.clone();
            let session = session.clone();
            let id = id.clone();
            async move { expire_on_401(&session, service.get_by_id(&id).await) }.boxed()
        }
    }

    /// All conversations, through the cache.
    pub async fn conversations(&self) -> ApiResult<Arc<Vec<Conversation>>> {
        self.query
            .fetch(QueryKey::ConversationList, self.list_fetcher())
            .await
    }

    /// Subscribes to the conversation list.
    pub fn observe_conversations(&self) -> QueryObserver<Vec<Conversation>> {
        self.query
            .observe(QueryKey::ConversationList, self.list_fetcher())
    }

    /// One conversation, through the cache.
    pub async fn conversation(&self, id: &str) -> ApiResult<Arc<Conversation>> {
        self.query
            .fetch(QueryKey::conversation(id), self.detail_fetcher(id))
            .await
    }

    /// Subscribes to one conversation.
    pub fn observe_conversation(&self, id: &str) -> QueryObserver<Conversation> {
        self.query
            .observe(QueryKey::conversation(id), self.detail_fetcher(id))
    }

    /// Sends a message to an existing conversation.
    ///
    /// Sends to the same conversation are applied in the order they were
    /// issued. A conversation echoed back by the server is written to the
    /// cache at once; the detail and the list are then invalidated so the
    /// next read revalidates them.
    pub async fn send_message(&self, conversation_id: &str, text: &str) -> ApiResult<ChatReply> {
        let key = QueryKey::conversation(conversation_id);
        let lock = self.query.write_lock(&key);
        let _guard = lock.lock().await;

        let ticket = self.query.begin_write();
        let reply = expire_on_401(
            &self.session,
            self.conversations.send_message(conversation_id, text).await,
        )?;

        if let ChatReply::Conversation(conversation) = &reply {
            if conversation.id == conversation_id {
                self.query.set_data(&key, ticket, conversation.clone());
            }
        }
        self.query.invalidate(&key);
        self.query.invalidate(&QueryKey::ConversationList);
        debug!(conversation = conversation_id, "Message sent");
        Ok(reply)
    }

    /// Starts a new conversation with `text` as its first message.
    ///
    /// The server does not return the new conversation's id. After the send
    /// succeeds the list is invalidated and fetched again, and the most
    /// recently updated conversation is reported as
    /// [`CreatedConversation::discovered`]. That is a best guess made from
    /// server data; no id is ever made up locally. A failure of the
    /// follow-up fetch leaves `discovered` empty rather than failing the
    /// already successful send.
    pub async fn create_conversation(&self, text: &str) -> ApiResult<CreatedConversation> {
        let lock = self.query.write_lock(&QueryKey::ConversationList);
        let _guard = lock.lock().await;

        let reply = expire_on_401(
            &self.session,
            self.conversations.create_with_first_message(text).await,
        )?;
        self.query.invalidate(&QueryKey::ConversationList);

        let discovered = match self
            .query
            .refresh(QueryKey::ConversationList, self.list_fetcher())
            .await
        {
            Ok(list) => list.iter().max_by_key(|c| c.updated_at).cloned(),
            Err(e) => {
                warn!(error = %e, "Could not list conversations after creating one");
                None
            }
        };

        match &discovered {
            Some(c) => info!(conversation = %c.id, "Discovered new conversation"),
            None => warn!("New conversation not found in list"),
        }
        Ok(CreatedConversation { reply, discovered })
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    fn page_fetcher(
        &self,
        page: u32,
        page_size: u32,
    ) -> impl Fn() -> BoxFuture<'static, ApiResult<PaginatedCollection<PdfItem>>> + Send + Sync + 'static
    {
        let service = self.templates.clone();
        let session = self.session.clone();
        move || {
            let service = service.clone();
            let session = session.clone();
            async move { expire_on_401(&session, service.list(page, page_size).await) }.boxed()
        }
    }

    /// One page of generated PDFs, through the cache. Each page is its own
    /// entry.
    pub async fn templates(
        &self,
        page: u32,
        page_size: u32,
    ) -> ApiResult<Arc<PaginatedCollection<PdfItem>>> {
        self.query
            .fetch(
                QueryKey::templates(page, page_size),
                self.page_fetcher(page, page_size),
            )
            .await
    }

    /// Subscribes to one page of generated PDFs.
    pub fn observe_templates(
        &self,
        page: u32,
        page_size: u32,
    ) -> QueryObserver<PaginatedCollection<PdfItem>> {
        self.query.observe(
            QueryKey::templates(page, page_size),
            self.page_fetcher(page, page_size),
        )
    }

    /// One generated PDF, through the cache.
    pub async fn template(&self, id: &str) -> ApiResult<Arc<PdfItem>> {
        let service = self.templates.clone();
        let session = self.session.clone();
        let owned = id.to_string();
        self.query
            .fetch(QueryKey::template(id), move || {
                let service = service.clone();
                let session = session.clone();
                let id = owned.clone();
                async move { expire_on_401(&session, service.get(&id).await) }
            })
            .await
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Checks whether the configured server speaks JSON, by posting
    /// throwaway credentials to the login endpoint. Never touches the
    /// session.
    pub async fn probe(&self) -> ProbeReport {
        let url = self
            .http
            .resolve(endpoints::LOGIN)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| endpoints::LOGIN.to_string());
        let body = json!({ "email": "probe@cvforge.invalid", "password": "probe" });

        let outcome = match self.http.post(endpoints::LOGIN, &body, None).await {
            Ok(response) => ProbeOutcome::Json {
                status: response.status,
            },
            Err(ApiError::Request { status, .. }) => ProbeOutcome::Json { status },
            Err(ApiError::Protocol { message, snippet }) => {
                ProbeOutcome::NotJson { message, snippet }
            }
            Err(e) => ProbeOutcome::Unreachable(e.to_string()),
        };
        debug!(url = %url, outcome = ?outcome, "Probe finished");
        ProbeReport { url, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, OFFLINE_BASE_URL};

    fn offline_client() -> ResumeClient {
        test_utils::client(OFFLINE_BASE_URL)
    }

    #[tokio::test]
    async fn test_reads_without_token_fail_unauthenticated() {
        let client = offline_client();
        assert_eq!(client.init().await, AuthState::SignedOut);
        assert_eq!(client.conversations().await.unwrap_err(), ApiError::Unauthenticated);
        assert_eq!(
            client.templates(1, 9).await.unwrap_err(),
            ApiError::Unauthenticated
        );
        assert_eq!(
            client.send_message("c1", "hi").await.unwrap_err(),
            ApiError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_logout_drops_cache_and_session() {
        let client = test_utils::signed_in_client(OFFLINE_BASE_URL, "tok").await;
        let ticket = client.query().begin_write();
        client
            .query()
            .set_data(&QueryKey::ConversationList, ticket, Vec::<Conversation>::new());

        client.logout().await.unwrap();
        assert!(client.query().is_empty());
        assert!(client.whoami().await.is_none());
        assert_eq!(client.session().state(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_expire_on_401_marks_session() {
        let client = test_utils::signed_in_client(OFFLINE_BASE_URL, "tok").await;
        let result: ApiResult<()> = expire_on_401(
            client.session(),
            Err(ApiError::Request {
                status: 401,
                message: "jwt expired".into(),
            }),
        );
        assert!(result.is_err());
        assert!(matches!(client.session().state(), AuthState::Expired(_)));
    }
}
