//! Cursor-based pagination for newest-first listings.
//!
//! ```rust,ignore
//! let page = PageRequest { limit: Some(20), after: None }.validate()?;
//! let rows = store.entries_for(identity_id, page.after, page.fetch_limit()).await?;
//! let page = Page::from_rows(rows, &page, |entry| entry.id.into_uuid());
//! ```

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Cursor
// ============================================================================

/// Opaque cursor (base64-encoded UUID of the last item on the previous page).
#[derive(Debug, Clone)]
pub struct Cursor(Uuid);

impl Cursor {
    pub fn new(id: Uuid) -> Self {
        Cursor(id)
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }

    pub fn encode_uuid(id: Uuid) -> String {
        Cursor::new(id).encode()
    }

    pub fn decode(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .context("Invalid cursor: not valid base64")?;
        let uuid = Uuid::from_slice(&bytes).context("Invalid cursor: not a valid UUID")?;
        Ok(Cursor(uuid))
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

// ============================================================================
// Request / response
// ============================================================================

/// Caller-supplied page request (query string shape).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub after: Option<String>,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            after: None,
        }
    }

    pub fn after(limit: u32, cursor: impl Into<String>) -> Self {
        Self {
            limit: Some(limit),
            after: Some(cursor.into()),
        }
    }

    /// Applies the default size, clamps to 1..=100 and decodes the cursor.
    pub fn validate(&self) -> Result<ValidatedPage, &'static str> {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let after = self
            .after
            .as_deref()
            .map(Cursor::decode)
            .transpose()
            .map_err(|_| "Invalid cursor")?
            .map(Cursor::into_uuid);

        Ok(ValidatedPage { limit, after })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPage {
    pub limit: u32,
    /// Items strictly older than this one are returned.
    pub after: Option<Uuid>,
}

impl ValidatedPage {
    /// Stores fetch one extra row so `has_more` can be answered without a count.
    pub fn fetch_limit(&self) -> u32 {
        self.limit + 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn from_rows(rows: Vec<T>, page: &ValidatedPage, id_of: impl Fn(&T) -> Uuid) -> Self {
        let (items, has_more) = trim_results(rows, page.limit);
        let next_cursor = if has_more {
            items.last().map(|item| Cursor::encode_uuid(id_of(item)))
        } else {
            None
        };
        Self {
            items,
            has_more,
            next_cursor,
        }
    }
}

/// Trim results fetched with `fetch_limit()` back to `limit`.
pub fn trim_results<T>(mut results: Vec<T>, limit: u32) -> (Vec<T>, bool) {
    let has_more = results.len() > limit as usize;
    results.truncate(limit as usize);
    (results, has_more)
}
