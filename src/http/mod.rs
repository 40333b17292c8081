//! HTTP client
//!
//! Single chokepoint for every backend call. [`HttpClient::send`] builds the
//! URL, attaches JSON and bearer headers, and classifies the outcome into the
//! [`ApiError`] taxonomy:
//!
//! - transport failure before a response → [`ApiError::Network`]
//! - response not declaring JSON, or unparseable JSON → [`ApiError::Protocol`]
//!   (an HTML error page is never read as data)
//! - JSON with a non-2xx status → [`ApiError::Request`], message taken from
//!   the body's `message` or `error` field
//!
//! The content type is checked before the status so a proxy's HTML 502 page
//! is reported as a protocol problem rather than a server message.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult, CvforgeError, Result};

pub mod endpoints;

const JSON_MIME: &str = "application/json";
/// Message used when an error body names no reason.
pub const FALLBACK_ERROR_MESSAGE: &str = "request failed";

/// A successful, JSON-bodied response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status (always in the 2xx range)
    pub status: u16,
    /// Parsed body; `Null` for an empty body
    pub body: Value,
}

/// JSON-over-HTTP client for the CVForge backend.
///
/// Cheap to clone; clones share the underlying connection pool.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use cvforge::http::HttpClient;
///
/// # async fn example() -> cvforge::error::Result<()> {
/// let client = HttpClient::new("http://localhost:3000", Duration::from_secs(30))?;
/// let response = client.get("/chat", Some("token")).await?;
/// println!("{}", response.body);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpClient {
    /// Creates a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CvforgeError::Config`] if the URL does not parse or the
    /// transport cannot be initialised.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CvforgeError::Config(format!("Invalid base URL {}: {}", base_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CvforgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Creates a client from the `api` configuration section.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_seconds))
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint against the base URL. Absolute `http(s)` URLs are
    /// used unchanged.
    pub fn resolve(&self, endpoint: &str) -> ApiResult<Url> {
        let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            )
        };
        Url::parse(&raw)
            .map_err(|e| ApiError::InvalidInput(format!("invalid endpoint {}: {}", endpoint, e)))
    }

    /// Sends one request and classifies the response.
    ///
    /// `body` is serialized for every method except `GET` and `DELETE`.
    /// `token`, when present, is sent as `Authorization: Bearer <token>`.
    ///
    /// # Errors
    ///
    /// See the module documentation for the classification rules.
    pub async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> ApiResult<RawResponse> {
        let url = self.resolve(endpoint)?;

        let mut req = self
            .client
            .request(method.clone(), url.clone())
            .header(CONTENT_TYPE, JSON_MIME)
            .header(ACCEPT, JSON_MIME);

        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        if let Some(body) = body {
            if method != Method::GET && method != Method::DELETE {
                req = req.body(body.to_string());
            }
        }

        debug!(method = %method, url = %url, authenticated = token.is_some(), "Sending request");

        let response = req.send().await.map_err(|e| {
            warn!(method = %method, url = %url, error = %e, "Request did not reach the server");
            ApiError::Network(describe_transport_error(&e))
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read response body: {}", e)))?;

        debug!(status = status.as_u16(), content_type = %content_type, bytes = text.len(), "Received response");

        if !declares_json(&content_type) {
            let got = if content_type.is_empty() {
                "no content type"
            } else {
                content_type.as_str()
            };
            warn!(status = status.as_u16(), content_type = %got, "Non-JSON response");
            return Err(ApiError::protocol(
                format!("expected JSON, got {}", got),
                &text,
            ));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ApiError::protocol(format!("malformed JSON: {}", e), &text))?
        };

        if !status.is_success() {
            let message = error_message(&body);
            debug!(status = status.as_u16(), message = %message, "Request rejected");
            return Err(ApiError::Request {
                status: status.as_u16(),
                message,
            });
        }

        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }

    /// `GET` shorthand.
    pub async fn get(&self, endpoint: &str, token: Option<&str>) -> ApiResult<RawResponse> {
        self.send(Method::GET, endpoint, None, token).await
    }

    /// `POST` shorthand.
    pub async fn post(
        &self,
        endpoint: &str,
        body: &Value,
        token: Option<&str>,
    ) -> ApiResult<RawResponse> {
        self.send(Method::POST, endpoint, Some(body), token).await
    }
}

fn declares_json(content_type: &str) -> bool {
    content_type.contains(JSON_MIME) || content_type.contains("+json")
}

fn error_message(body: &Value) -> String {
    ["message", "error"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_ERROR_MESSAGE)
        .to_string()
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("cannot connect to server: {}", e)
    } else {
        e.to_string()
    }
}
