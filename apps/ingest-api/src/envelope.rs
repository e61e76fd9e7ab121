//! Response envelope.
//!
//! ```text
//! { "data": ..., "meta": { "request_id": "req_...", "warnings": [],
//!                          "page": { "limit": 50, "cursor": "41" } } }
//! ```
//!
//! `page` is only present on list responses. Its `cursor` is the next
//! cursor when there is one, else the cursor the caller sent, else null.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::context::current_request_id;
use opsledger_core::page::{Page, PageRequest};

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub limit: u32,
    pub cursor: Option<String>,
}

impl PageMeta {
    pub fn new(request: &PageRequest, next_cursor: Option<i64>) -> Self {
        PageMeta {
            limit: request.limit,
            cursor: next_cursor.or(request.cursor).map(|c| c.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub request_id: String,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageMeta>,
}

impl Meta {
    /// Meta for the request currently being served.
    pub fn current(warnings: Vec<String>) -> Self {
        Meta {
            request_id: current_request_id(),
            warnings,
            page: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    pub meta: Meta,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope {
            data,
            meta: Meta::current(Vec::new()),
        }
    }

    pub fn with_warnings(data: T, warnings: Vec<String>) -> Self {
        Envelope {
            data,
            meta: Meta::current(warnings),
        }
    }
}

impl<T> Envelope<Vec<T>> {
    /// List envelope carrying `meta.page`.
    pub fn page(page: Page<T>, request: &PageRequest) -> Self {
        let mut meta = Meta::current(Vec::new());
        meta.page = Some(PageMeta::new(request, page.next_cursor));
        Envelope {
            data: page.items,
            meta,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_cursor_prefers_next() {
        let request = PageRequest {
            limit: 2,
            cursor: Some(4),
        };
        assert_eq!(PageMeta::new(&request, Some(9)).cursor.as_deref(), Some("9"));
        assert_eq!(PageMeta::new(&request, None).cursor.as_deref(), Some("4"));

        let first = PageRequest::default();
        assert_eq!(PageMeta::new(&first, None).cursor, None);
    }

    #[test]
    fn test_page_meta_skipped_on_single_resources() {
        let body = serde_json::to_value(Envelope::ok(1)).unwrap();
        assert!(body["meta"].get("page").is_none());
        assert!(body["meta"]["request_id"].as_str().unwrap().starts_with("req_"));
    }
}
