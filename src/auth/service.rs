//! Login and signup
//!
//! Both calls post credentials without a bearer token and expect a token
//! back, either at `data.token` or at the top-level `token`. Any refusal by
//! the server becomes [`ApiError::Credential`] with the server's message;
//! transport, protocol and 5xx failures keep their own kinds so the caller
//! can tell "wrong password" from "server down".

use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::session::Session;
use crate::error::{ApiError, ApiResult};
use crate::http::{endpoints, HttpClient, FALLBACK_ERROR_MESSAGE};
use crate::models::AuthSession;
use crate::normalize::{aliases, normalize_envelope, DATA_KEY};

const LOGIN_FAILED: &str = "Login failed";
const SIGNUP_FAILED: &str = "Signup failed";

/// Auth resource service. On success the session is persisted through
/// [`Session::establish`] before the call returns.
#[derive(Debug, Clone)]
pub struct AuthService {
    http: HttpClient,
    session: Session,
}

impl AuthService {
    /// Creates the service.
    pub fn new(http: HttpClient, session: Session) -> Self {
        Self { http, session }
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// - [`ApiError::InvalidInput`] for an empty email or password
    /// - [`ApiError::Credential`] when the server refuses the credentials or
    ///   answers without a token
    /// - [`ApiError::Network`], [`ApiError::Protocol`], or a 5xx
    ///   [`ApiError::Request`] when the server could not be asked properly
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthSession> {
        require_field("email", email)?;
        require_field("password", password)?;

        let body = json!({ "email": email, "password": password });
        let session = self
            .authenticate(endpoints::LOGIN, &body, LOGIN_FAILED, email, None)
            .await?;
        self.session.establish(session.clone()).await?;
        Ok(session)
    }

    /// Creates an account and signs in.
    ///
    /// # Errors
    ///
    /// Same as [`AuthService::login`].
    #[instrument(skip(self, password))]
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> ApiResult<AuthSession> {
        require_field("name", name)?;
        require_field("email", email)?;
        require_field("password", password)?;

        let body = json!({ "name": name, "email": email, "password": password });
        let session = self
            .authenticate(endpoints::REGISTER, &body, SIGNUP_FAILED, email, Some(name))
            .await?;
        self.session.establish(session.clone()).await?;
        Ok(session)
    }

    async fn authenticate(
        &self,
        endpoint: &str,
        body: &Value,
        failure: &str,
        email: &str,
        name: Option<&str>,
    ) -> ApiResult<AuthSession> {
        let raw = match self.http.post(endpoint, body, None).await {
            Ok(response) => response.body,
            Err(ApiError::Request { status, message }) if !is_server_fault(status) => {
                debug!(status, "Credentials rejected");
                return Err(ApiError::Credential(credential_message(Some(message), failure)));
            }
            Err(e) => return Err(e),
        };

        let envelope = normalize_envelope(&raw, aliases::NONE);
        if !envelope.success {
            return Err(ApiError::Credential(credential_message(envelope.message, failure)));
        }

        let Some(token) = extract_token(&raw) else {
            warn!("Auth response carried no token");
            return Err(ApiError::Credential(credential_message(envelope.message, failure)));
        };

        let user = extract_user(&raw);
        let field = |key: &str| {
            user.and_then(|u| u.get(key))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(AuthSession {
            token,
            user_id: field("id").or_else(|| field("_id")),
            display_name: field("name").or_else(|| name.map(str::to_string)),
            email: field("email").or_else(|| Some(email.to_string())),
        })
    }
}

fn require_field(name: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{} must not be empty", name)));
    }
    Ok(())
}

fn is_server_fault(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

fn credential_message(message: Option<String>, failure: &str) -> String {
    message
        .filter(|m| !m.is_empty() && m != FALLBACK_ERROR_MESSAGE)
        .unwrap_or_else(|| failure.to_string())
}

/// Token lookup order: `data.token`, then top-level `token`.
fn extract_token<'a>(raw: &'a Value) -> Option<String> {
    let usable = |v: Option<&'a Value>| -> Option<&'a str> { v.and_then(Value::as_str).filter(|t| !t.is_empty()) };
    usable(raw.get(DATA_KEY).and_then(|d| d.get("token")))
        .or_else(|| usable(raw.get("token")))
        .map(str::to_string)
}

fn extract_user(raw: &Value) -> Option<&Value> {
    raw.get(DATA_KEY)
        .and_then(|d| d.get("user"))
        .or_else(|| raw.get("user"))
        .filter(|u| u.is_object())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_prefers_data() {
        let raw = json!({"token": "outer", "data": {"token": "inner"}});
        assert_eq!(extract_token(&raw).as_deref(), Some("inner"));
    }

    #[test]
    fn test_extract_token_top_level() {
        let raw = json!({"success": true, "token": "tok"});
        assert_eq!(extract_token(&raw).as_deref(), Some("tok"));
    }

    #[test]
    fn test_extract_token_falls_back_when_data_token_unusable() {
        let raw = json!({"data": {"token": null}, "token": "outer"});
        assert_eq!(extract_token(&raw).as_deref(), Some("outer"));
        let raw = json!({"data": {"token": ""}, "token": "outer"});
        assert_eq!(extract_token(&raw).as_deref(), Some("outer"));
    }

    #[test]
    fn test_extract_token_missing_or_empty() {
        assert!(extract_token(&json!({"success": true})).is_none());
        assert!(extract_token(&json!({"token": ""})).is_none());
        assert!(extract_token(&json!({"token": 42})).is_none());
    }

    #[test]
    fn test_extract_user_either_location() {
        let nested = json!({"data": {"user": {"name": "A"}}});
        let flat = json!({"user": {"name": "B"}});
        assert_eq!(extract_user(&nested).unwrap()["name"], "A");
        assert_eq!(extract_user(&flat).unwrap()["name"], "B");
        assert!(extract_user(&json!({"user": "nope"})).is_none());
    }

    #[test]
    fn test_credential_message_fallbacks() {
        assert_eq!(credential_message(Some("Bad password".into()), LOGIN_FAILED), "Bad password");
        assert_eq!(credential_message(None, LOGIN_FAILED), LOGIN_FAILED);
        assert_eq!(
            credential_message(Some(FALLBACK_ERROR_MESSAGE.into()), SIGNUP_FAILED),
            SIGNUP_FAILED
        );
    }

    #[test]
    fn test_server_fault_statuses() {
        assert!(is_server_fault(500));
        assert!(is_server_fault(429));
        assert!(!is_server_fault(401));
        assert!(!is_server_fault(409));
    }
}
