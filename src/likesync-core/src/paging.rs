//! Lazy iteration over cursor-paginated library listings.
//!
//! A [`PagedSequence`] yields the items of an initial page, then follows the
//! page's `next` cursor through a caller-supplied fetch capability, one remote
//! call per page transition. It never fetches a page twice and fails instead of
//! looping when the remote service hands back a cursor it already gave out.

use crate::library::LibraryError;
use crate::models::{Page, PageCursor, PageMeta};
use std::collections::VecDeque;
use thiserror::Error;

/// Number of recently followed cursors remembered for loop detection.
pub const DEFAULT_LOOP_WINDOW: usize = 10;

/// The remote listing returned a cursor that was already followed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pagination loop: cursor {cursor} was already followed recently (last page: {page})")]
pub struct PaginationLoopError {
    pub cursor: PageCursor,
    pub page: PageMeta,
}

#[derive(Debug, Error)]
pub enum PagingError {
    #[error(transparent)]
    Loop(#[from] PaginationLoopError),
    #[error("failed to fetch page: {0}")]
    Fetch(#[from] LibraryError),
}

/// Forward-only sequence over every item of a paginated listing.
///
/// Each page is fetched at most once, so the sequence cannot be restarted;
/// re-reading requires a fresh initial page. After the first error the
/// sequence is exhausted.
pub struct PagedSequence<T, F> {
    items: std::vec::IntoIter<T>,
    next: Option<PageCursor>,
    meta: PageMeta,
    fetch_next: F,
    seen: VecDeque<PageCursor>,
    window: usize,
    pages_fetched: usize,
    finished: bool,
}

/// Paginate starting at `initial`, using `fetch_next` to follow cursors.
pub fn paginate<T, F>(initial: Page<T>, fetch_next: F) -> PagedSequence<T, F>
where
    F: FnMut(&PageCursor) -> Result<Page<T>, LibraryError>,
{
    PagedSequence::new(initial, fetch_next)
}

impl<T, F> PagedSequence<T, F>
where
    F: FnMut(&PageCursor) -> Result<Page<T>, LibraryError>,
{
    pub fn new(initial: Page<T>, fetch_next: F) -> Self {
        let meta = initial.meta();
        tracing::debug!("Got {meta}");
        Self {
            items: initial.items.into_iter(),
            next: initial.next,
            meta,
            fetch_next,
            seen: VecDeque::with_capacity(DEFAULT_LOOP_WINDOW),
            window: DEFAULT_LOOP_WINDOW,
            pages_fetched: 1,
            finished: false,
        }
    }

    /// Remember the last `window` cursors instead of the default ten.
    pub fn with_loop_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        while self.seen.len() > self.window {
            self.seen.pop_front();
        }
        self
    }

    /// Pages retrieved so far, including the initial one.
    #[cfg(test)]
    fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn advance(&mut self) -> Result<bool, PagingError> {
        let Some(cursor) = self.next.take() else {
            return Ok(false);
        };

        if self.seen.contains(&cursor) {
            return Err(PaginationLoopError {
                cursor,
                page: self.meta.clone(),
            }
            .into());
        }
        if self.seen.len() == self.window {
            self.seen.pop_front();
        }
        self.seen.push_back(cursor.clone());

        let page = (self.fetch_next)(&cursor)?;
        self.pages_fetched += 1;
        self.meta = page.meta();
        tracing::debug!("Got {}", self.meta);
        self.items = page.items.into_iter();
        self.next = page.next;
        Ok(true)
    }
}

impl<T, F> Iterator for PagedSequence<T, F>
where
    F: FnMut(&PageCursor) -> Result<Page<T>, LibraryError>,
{
    type Item = Result<T, PagingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if let Some(item) = self.items.next() {
                return Some(Ok(item));
            }
            match self.advance() {
                Ok(true) => continue,
                Ok(false) => {
                    tracing::debug!("Listing ended after {} pages", self.pages_fetched);
                    self.finished = true;
                    return None;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
