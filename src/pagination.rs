//! Paging descriptor derived from query parameters.
//!
//! Cursors are opaque to this crate. The only interpretation applied is
//! normalization: whitespace is trimmed, and when the cursor that the
//! requested direction reads from is empty it is replaced by the sentinel
//! that selects the first page in that direction.

use serde::{Deserialize, Serialize};

/// Page size used when `perPage` is absent, unparsable or zero.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Cursor meaning "start from the newest item" when paging forward.
pub const NEXT_CURSOR_START: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFF";

/// Cursor meaning "start from the oldest item" when paging backward.
pub const PREV_CURSOR_START: &str = "00000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDirection {
    #[default]
    Next,
    Prev,
}

impl PageDirection {
    /// Anything other than `prev` (case-insensitive) pages forward.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case("prev") => PageDirection::Prev,
            _ => PageDirection::Next,
        }
    }
}

/// Raw pagination query parameters.
///
/// Every field is kept as a string so a bad value never rejects the request.
#[derive(Debug, Clone, Default)]
pub struct PaginationQuery {
    pub per_page: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub next_page_cursor: Option<String>,
    pub prev_page_cursor: Option<String>,
}

/// Normalized paging descriptor handed to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pageable {
    pub sort: String,
    pub per_page: u32,
    pub direction: PageDirection,
    pub next_cursor: String,
    pub prev_cursor: String,
}

impl Default for Pageable {
    fn default() -> Self {
        Self::from_query(&PaginationQuery::default())
    }
}

impl Pageable {
    /// Build a normalized descriptor. Never fails.
    pub fn from_query(query: &PaginationQuery) -> Self {
        let per_page = query
            .per_page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PER_PAGE);

        let mut pageable = Self {
            sort: query.sort.as_deref().unwrap_or_default().to_uppercase(),
            per_page,
            direction: PageDirection::parse(query.direction.as_deref()),
            next_cursor: query.next_page_cursor.clone().unwrap_or_default(),
            prev_cursor: query.prev_page_cursor.clone().unwrap_or_default(),
        };
        pageable.normalize_cursors();
        pageable
    }

    /// Trim both cursors and default the one the direction reads from.
    /// Idempotent.
    pub fn normalize_cursors(&mut self) {
        self.next_cursor = self.next_cursor.trim().to_string();
        self.prev_cursor = self.prev_cursor.trim().to_string();

        match self.direction {
            PageDirection::Next if self.next_cursor.is_empty() => {
                self.next_cursor = NEXT_CURSOR_START.to_string();
            }
            PageDirection::Prev if self.prev_cursor.is_empty() => {
                self.prev_cursor = PREV_CURSOR_START.to_string();
            }
            _ => {}
        }
    }

    /// The cursor the requested direction pages from.
    pub fn cursor(&self) -> &str {
        match self.direction {
            PageDirection::Next => &self.next_cursor,
            PageDirection::Prev => &self.prev_cursor,
        }
    }
}
