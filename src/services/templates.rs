//! Paginated PDF resource ("templates" gallery)
//!
//! Pagination is server-side and authoritative: the service passes `page`
//! and `pageSize` through and returns exactly what the server sent. A page
//! past the end is a valid request and yields an empty page whose `meta`
//! still reports the real totals.

use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{payload, ServiceBase};
use crate::auth::TokenStore;
use crate::error::{ApiError, ApiResult};
use crate::http::{endpoints, HttpClient};
use crate::models::{PaginatedCollection, PdfItem};
use crate::normalize::aliases;

/// First page.
pub const DEFAULT_PAGE: u32 = 1;
/// Gallery grid size.
pub const DEFAULT_PAGE_SIZE: u32 = 9;

/// PDF template service.
#[derive(Debug, Clone)]
pub struct TemplateService {
    base: ServiceBase,
}

impl TemplateService {
    /// Creates the service.
    pub fn new(http: HttpClient, tokens: TokenStore) -> Self {
        Self {
            base: ServiceBase { http, tokens },
        }
    }

    /// Fetches one page of generated PDFs.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Unauthenticated`] without a token
    /// - [`ApiError::InvalidInput`] when `page` or `page_size` is zero
    /// - [`ApiError::Protocol`] when the page does not decode
    #[instrument(skip(self))]
    pub async fn list(&self, page: u32, page_size: u32) -> ApiResult<PaginatedCollection<PdfItem>> {
        let token = self.base.tokens.require().await?;
        if page < 1 {
            return Err(ApiError::InvalidInput("page must be >= 1".to_string()));
        }
        if page_size < 1 {
            return Err(ApiError::InvalidInput("pageSize must be >= 1".to_string()));
        }

        let response = self
            .base
            .http
            .get(&endpoints::pdfs(page, page_size), Some(&token))
            .await?;
        let data = payload(response, aliases::NONE, "Failed to fetch PDFs")?;

        let collection: PaginatedCollection<PdfItem> = decode(&data, "PDF page")?;
        if collection.items.len() > collection.meta.page_size as usize {
            warn!(
                items = collection.items.len(),
                page_size = collection.meta.page_size,
                "Server returned more items than the page size"
            );
        }
        debug!(
            page = collection.meta.page,
            items = collection.items.len(),
            total_pages = collection.meta.total_pages,
            "Fetched PDF page"
        );
        Ok(collection)
    }

    /// Fetches a single generated PDF.
    ///
    /// # Errors
    ///
    /// [`ApiError::Request`] with status 404 when the envelope carries no
    /// item, plus the errors of [`TemplateService::list`].
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> ApiResult<PdfItem> {
        let token = self.base.tokens.require().await?;
        endpoints::check_id("PDF", id)?;
        let response = self.base.http.get(&endpoints::pdf(id), Some(&token)).await?;
        let data = payload(response, aliases::NONE, "Failed to fetch PDF")?;
        if data.is_null() {
            return Err(ApiError::Request {
                status: 404,
                message: format!("PDF {} not found", id),
            });
        }
        decode(&data, "PDF")
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: &Value, what: &str) -> ApiResult<T> {
    serde_json::from_value(data.clone()).map_err(|e| {
        ApiError::protocol(format!("malformed {} payload: {}", what, e), &data.to_string())
    })
}
