//! Extractors that answer malformed input with the API error body.

use axum::extract::{FromRequest, FromRequestParts};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use opsledger_core::page::PageRequest;

/// `axum::Json` with [`ApiError`] as rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with [`ApiError`] as rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `axum::extract::Path` with [`ApiError`] as rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `limit` and `cursor` query parameters.
///
/// The cursor arrives as a string so a malformed one is a 422, not a
/// query rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

impl PageParams {
    /// Clamps `limit` into the configured bounds and parses the cursor.
    pub fn resolve(&self, state: &AppState) -> ApiResult<PageRequest> {
        let cursor = PageRequest::parse_cursor(self.cursor.as_deref())?;
        Ok(PageRequest::clamped(
            self.limit,
            cursor,
            state.config.default_page_limit,
            state.config.max_page_limit,
        ))
    }
}

/// A required `tenant_id` query parameter.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TenantParam {
    pub tenant_id: i64,
}
