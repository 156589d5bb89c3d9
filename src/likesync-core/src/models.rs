use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A library-scoped track identifier.
///
/// Libraries MUST treat this as an opaque, case-sensitive identifier that is
/// stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl AsRef<str> for TrackId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A library-scoped playlist identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct PlaylistId(pub String);

impl PlaylistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaylistId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for PlaylistId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One row of the user's liked songs, newest-first by `added_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikedEntry {
    pub track_id: TrackId,
    pub track_name: String,
    pub duration_ms: u64,
    pub added_at: DateTime<Utc>,
}

/// One row of a playlist listing, newest-first by `added_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub track_id: TrackId,
    pub track_name: String,
    pub added_at: DateTime<Utc>,
}

/// Shared view over liked and playlist rows used by the reconciler.
pub trait Entry {
    fn track_id(&self) -> &TrackId;
    fn track_name(&self) -> &str;
    fn added_at(&self) -> DateTime<Utc>;
}

impl Entry for LikedEntry {
    fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    fn track_name(&self) -> &str {
        &self.track_name
    }

    fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }
}

impl Entry for PlaylistEntry {
    fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    fn track_name(&self) -> &str {
        &self.track_name
    }

    fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }
}

impl<T: Entry + ?Sized> Entry for &T {
    fn track_id(&self) -> &TrackId {
        (**self).track_id()
    }

    fn track_name(&self) -> &str {
        (**self).track_name()
    }

    fn added_at(&self) -> DateTime<Utc> {
        (**self).added_at()
    }
}

/// Playlist metadata needed to pick the sync target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub owner_id: String,
    pub description: Option<String>,
    pub track_count: Option<u32>,
}

/// Paging request represented as offset/limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    pub fn first_page(limit: u32) -> Self {
        Self { offset: 0, limit }
    }
}

/// Opaque continuation token returned by a paged library call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct PageCursor(pub String);

impl PageCursor {
    pub fn new(cursor: impl Into<String>) -> Self {
        Self(cursor.into())
    }
}

impl AsRef<str> for PageCursor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single page of items plus an optional cursor for continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub href: Option<String>,
}

impl<T> Page<T> {
    pub fn single_page(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    pub fn new(items: Vec<T>, next: Option<PageCursor>) -> Self {
        Self {
            items,
            next,
            offset: None,
            limit: None,
            total: None,
            href: None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Everything about the page except its items.
    pub fn meta(&self) -> PageMeta {
        PageMeta {
            item_count: self.items.len(),
            next: self.next.clone(),
            offset: self.offset,
            limit: self.limit,
            total: self.total,
            href: self.href.clone(),
        }
    }
}

/// Compact description of a page, safe to carry in errors and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub item_count: usize,
    pub next: Option<PageCursor>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub total: Option<u32>,
    pub href: Option<String>,
}

impl fmt::Display for PageMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seen = self.offset.unwrap_or(0) as usize + self.item_count;
        match self.total {
            Some(total) => write!(f, "{seen}/{total} items")?,
            None => write!(f, "{seen}/unknown items")?,
        }
        if let Some(href) = &self.href {
            write!(f, " from {href}")?;
        }
        if let Some(next) = &self.next {
            write!(f, ", next {next}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_drops_items_and_keeps_cursor() {
        let mut page = Page::new(vec![1, 2, 3], Some(PageCursor::new("offset:3")));
        page.offset = Some(0);
        page.total = Some(10);

        let meta = page.meta();
        assert_eq!(meta.item_count, 3);
        assert_eq!(meta.next, Some(PageCursor::new("offset:3")));
        assert_eq!(meta.to_string(), "3/10 items, next offset:3");
    }

    #[test]
    fn single_page_has_no_next() {
        let page = Page::single_page(vec!["a"]);
        assert!(!page.has_next());
    }
}
