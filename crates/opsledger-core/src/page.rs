//! # Pagination
//!
//! Two cursor styles exist and are not interchangeable for a resource:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Id cursor      WHERE id > :cursor ORDER BY id LIMIT :limit + 1         │
//! │                 next cursor = id of the last returned row               │
//! │                                                                         │
//! │  Offset cursor  ORDER BY id LIMIT :limit + 1 OFFSET :cursor             │
//! │                 next cursor = cursor + limit                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both fetch one extra row to learn whether another page exists.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default page size.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 500;

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: u32,
    pub cursor: Option<i64>,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            limit: DEFAULT_PAGE_LIMIT,
            cursor: None,
        }
    }
}

impl PageRequest {
    /// Clamps `limit` into `1..=max_limit`, falling back to `default_limit`.
    ///
    /// ## Example
    /// ```rust
    /// use opsledger_core::page::PageRequest;
    ///
    /// assert_eq!(PageRequest::clamped(None, None, 50, 500).limit, 50);
    /// assert_eq!(PageRequest::clamped(Some(0), None, 50, 500).limit, 1);
    /// assert_eq!(PageRequest::clamped(Some(9000), None, 50, 500).limit, 500);
    /// ```
    pub fn clamped(limit: Option<i64>, cursor: Option<i64>, default_limit: u32, max_limit: u32) -> Self {
        let max = i64::from(max_limit.max(1));
        let limit = limit.unwrap_or(i64::from(default_limit)).clamp(1, max);
        PageRequest {
            // bounded by max_limit above
            limit: limit as u32,
            cursor,
        }
    }

    /// Parses a cursor query parameter.
    pub fn parse_cursor(raw: Option<&str>) -> Result<Option<i64>, ValidationError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => s
                .parse::<i64>()
                .ok()
                .filter(|c| *c >= 0)
                .map(Some)
                .ok_or_else(|| ValidationError::invalid("cursor", "must be a non-negative integer")),
        }
    }

    /// Rows to fetch: one more than the page holds.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.limit) + 1
    }

    /// Offset for offset-cursor resources.
    pub fn offset(&self) -> i64 {
        self.cursor.unwrap_or(0)
    }
}

/// One page of rows plus the cursor for the next page, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<i64>,
}

impl<T> Page<T> {
    /// Builds an id-cursor page from `limit + 1` fetched rows.
    pub fn by_id(mut rows: Vec<T>, request: &PageRequest, id_of: impl Fn(&T) -> i64) -> Self {
        let limit = request.limit as usize;
        let next_cursor = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(id_of)
        } else {
            None
        };
        Page {
            items: rows,
            next_cursor,
        }
    }

    /// Builds an offset-cursor page from `limit + 1` fetched rows.
    pub fn by_offset(mut rows: Vec<T>, request: &PageRequest) -> Self {
        let limit = request.limit as usize;
        let next_cursor = if rows.len() > limit {
            rows.truncate(limit);
            Some(request.offset() + i64::from(request.limit))
        } else {
            None
        };
        Page {
            items: rows,
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_page_has_next_cursor_when_overfetched() {
        let request = PageRequest { limit: 2, cursor: None };
        let page = Page::by_id(vec![3_i64, 5, 9], &request, |id| *id);
        assert_eq!(page.items, vec![3, 5]);
        assert_eq!(page.next_cursor, Some(5));
    }

    #[test]
    fn test_last_page_has_no_cursor() {
        let request = PageRequest { limit: 2, cursor: Some(5) };
        let page = Page::by_id(vec![9_i64], &request, |id| *id);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_offset_page_advances_by_limit() {
        let request = PageRequest { limit: 2, cursor: Some(4) };
        let page = Page::by_offset(vec!['a', 'b', 'c'], &request);
        assert_eq!(page.items, vec!['a', 'b']);
        assert_eq!(page.next_cursor, Some(6));
    }

    #[test]
    fn test_cursor_parsing() {
        assert_eq!(PageRequest::parse_cursor(None).unwrap(), None);
        assert_eq!(PageRequest::parse_cursor(Some("")).unwrap(), None);
        assert_eq!(PageRequest::parse_cursor(Some("17")).unwrap(), Some(17));
        assert!(PageRequest::parse_cursor(Some("abc")).is_err());
        assert!(PageRequest::parse_cursor(Some("-1")).is_err());
    }
}
