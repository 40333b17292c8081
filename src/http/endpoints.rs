//! Backend endpoint paths, relative to the configured base URL.

use crate::error::{ApiError, ApiResult};

/// `POST` credentials, unauthenticated
pub const LOGIN: &str = "/auth/login";

/// `POST` new account, unauthenticated
pub const REGISTER: &str = "/auth/register";

/// `GET` conversation list / `POST` message
pub const CHAT: &str = "/chat";

/// Rejects identifiers that would change the shape of the request path.
pub fn check_id(kind: &str, id: &str) -> ApiResult<()> {
    if id.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{} id must not be empty", kind)));
    }
    if id.contains(['/', '?', '#']) || id.chars().any(char::is_whitespace) {
        return Err(ApiError::InvalidInput(format!(
            "{} id contains reserved characters: {:?}",
            kind, id
        )));
    }
    Ok(())
}

/// `GET` one conversation.
pub fn conversation(id: &str) -> String {
    format!("{}/{}", CHAT, id)
}

/// `GET` one page of generated PDFs.
pub fn pdfs(page: u32, page_size: u32) -> String {
    format!("{}/pdfs?page={}&pageSize={}", CHAT, page, page_size)
}

/// `GET` one generated PDF.
pub fn pdf(id: &str) -> String {
    format!("{}/pdfs/{}", CHAT, id)
}
