use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[error("invalid cursor")]
pub struct InvalidCursor;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CursorPayload {
    id: u64,
}

/// Opaque continuation token carrying the last primary key of a page.
///
/// `Display` encodes, `FromStr` decodes. Only the canonical encoding is
/// accepted back, so any string not produced by `Display` fails.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct IdCursor(pub u64);

impl fmt::Display for IdCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = format!(r#"{{"id":{}}}"#, self.0);
        f.write_str(&URL_SAFE.encode(json))
    }
}

impl FromStr for IdCursor {
    type Err = InvalidCursor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = URL_SAFE.decode(s).map_err(|_| InvalidCursor)?;
        let payload: CursorPayload = serde_json::from_slice(&bytes).map_err(|_| InvalidCursor)?;
        let cursor = IdCursor(payload.id);
        if cursor.to_string() != s {
            return Err(InvalidCursor);
        }
        Ok(cursor)
    }
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn page_limit(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE)
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Build a page from up to `limit + 1` rows fetched in ascending key order.
    pub fn from_rows(mut rows: Vec<T>, limit: u32, key: impl Fn(&T) -> u64) -> Self {
        let limit = limit as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = match (has_more, rows.last()) {
            (true, Some(last)) => Some(IdCursor(key(last)).to_string()),
            _ => None,
        };
        Page {
            items: rows,
            next_cursor,
            has_more,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}
