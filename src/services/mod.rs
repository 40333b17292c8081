//! Resource services
//!
//! One stateless service per backend resource, each a thin layer over
//! [`HttpClient`] and the [`crate::normalize`] functions. Services never
//! cache and never retry; both belong to [`crate::query`].

use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::http::{HttpClient, RawResponse};
use crate::normalize::normalize_envelope;

pub mod conversations;
pub mod templates;

pub use conversations::ConversationService;
pub use templates::TemplateService;

/// Unwraps a successful response into its payload.
///
/// A 2xx body that declares `success: false` is still a failure and becomes
/// [`ApiError::Request`] carrying the response status.
pub(crate) fn payload(
    response: RawResponse,
    aliases: &[&str],
    failure: &str,
) -> ApiResult<Value> {
    let envelope = normalize_envelope(&response.body, aliases);
    if !envelope.success {
        debug!(status = response.status, "Envelope reported failure");
        return Err(ApiError::Request {
            status: response.status,
            message: envelope.message.unwrap_or_else(|| failure.to_string()),
        });
    }
    Ok(envelope.data)
}

/// Returns `text` trimmed, or [`ApiError::InvalidInput`] when nothing is left.
pub(crate) fn message_text(text: &str) -> ApiResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput("message must not be empty".to_string()));
    }
    Ok(trimmed)
}

/// Shared by the service constructors.
#[derive(Debug, Clone)]
pub(crate) struct ServiceBase {
    pub(crate) http: HttpClient,
    pub(crate) tokens: crate::auth::TokenStore,
}
