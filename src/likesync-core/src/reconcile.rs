//! Liked-songs to playlist reconciliation.
//!
//! Both inputs are streams ordered newest-first by their `added_at`. The full
//! merge reads both completely and is the only mode that notices tracks that
//! were unliked without leaving a trace. The fast merge walks both streams
//! from the newest end and stops as soon as they agree, so its cost grows with
//! the number of new likes rather than with the library size.

use crate::models::{Entry, TrackId};
use crate::paging::PagingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::convert::Infallible;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Full,
    Fast,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Fast => "fast",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edit that brings the playlist in line with the liked songs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    /// Ids to add, in liked-songs order (newest first).
    pub to_add: Vec<TrackId>,
    pub to_remove: BTreeSet<TrackId>,
}

impl MergeResult {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Likes,
    Playlist,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Likes => f.write_str("liked songs"),
            StreamKind::Playlist => f.write_str("playlist"),
        }
    }
}

/// An input stream of the fast merge was not newest-first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stream} stream is not newest-first at position {position}: {current} follows {previous}")]
pub struct OrderingViolation {
    pub stream: StreamKind,
    pub position: usize,
    pub previous: DateTime<Utc>,
    pub current: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Paging(#[from] PagingError),
    #[error(transparent)]
    Ordering(#[from] OrderingViolation),
}

impl From<Infallible> for ReconcileError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Fail the fast merge on the first out-of-order pair it reads.
    pub check_ordering: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            check_ordering: true,
        }
    }
}

/// Compute the edit between `likes` and `playlist` in the given mode.
pub fn reconcile<L, P, A, B, EL, EP>(
    likes: L,
    playlist: P,
    mode: SyncMode,
    options: &ReconcileOptions,
) -> Result<MergeResult, ReconcileError>
where
    L: IntoIterator<Item = Result<A, EL>>,
    P: IntoIterator<Item = Result<B, EP>>,
    A: Entry,
    B: Entry,
    ReconcileError: From<EL> + From<EP>,
{
    match mode {
        SyncMode::Full => merge_full(likes, playlist),
        SyncMode::Fast => merge_fast(likes, playlist, options),
    }
}

/// Full merge: reads both streams to the end.
///
/// `to_add` keeps every liked id missing from the playlist, in liked order and
/// with repeats. `to_remove` holds every playlist id that is no longer liked.
pub fn merge_full<L, P, A, B, EL, EP>(likes: L, playlist: P) -> Result<MergeResult, ReconcileError>
where
    L: IntoIterator<Item = Result<A, EL>>,
    P: IntoIterator<Item = Result<B, EP>>,
    A: Entry,
    B: Entry,
    ReconcileError: From<EL> + From<EP>,
{
    let liked_ids = likes
        .into_iter()
        .map(|entry| entry.map(|e| e.track_id().clone()))
        .collect::<Result<Vec<_>, _>>()?;
    let playlist_ids = playlist
        .into_iter()
        .map(|entry| entry.map(|e| e.track_id().clone()))
        .collect::<Result<HashSet<_>, _>>()?;

    let liked_set: HashSet<&TrackId> = liked_ids.iter().collect();
    let to_remove = playlist_ids
        .iter()
        .filter(|id| !liked_set.contains(id))
        .cloned()
        .collect();
    let to_add = liked_ids
        .iter()
        .filter(|id| !playlist_ids.contains(*id))
        .cloned()
        .collect();

    tracing::debug!(
        "Full merge over {} likes and {} playlist tracks",
        liked_ids.len(),
        playlist_ids.len()
    );
    Ok(MergeResult { to_add, to_remove })
}

/// Fast merge: adds new likes until the two streams meet.
///
/// Only the head of the playlist is ever read. `to_remove` is always empty;
/// unliked tracks need a full merge.
pub fn merge_fast<L, P, A, B, EL, EP>(
    likes: L,
    playlist: P,
    options: &ReconcileOptions,
) -> Result<MergeResult, ReconcileError>
where
    L: IntoIterator<Item = Result<A, EL>>,
    P: IntoIterator<Item = Result<B, EP>>,
    A: Entry,
    B: Entry,
    ReconcileError: From<EL> + From<EP>,
{
    let mut likes = OrderedStream::new(likes, StreamKind::Likes, options.check_ordering);
    let mut playlist = OrderedStream::new(playlist, StreamKind::Playlist, options.check_ordering);

    let mut to_add = Vec::new();
    let mut liked = likes.advance()?;
    let in_playlist = playlist.advance()?;

    while let Some(like) = liked {
        match &in_playlist {
            Some(head)
                if like.track_id() != head.track_id() && head.added_at() <= like.added_at() =>
            {
                tracing::debug!("Adding {}, liked after the playlist head", like.track_name());
            }
            Some(head) if like.track_id() == head.track_id() => break,
            _ => tracing::info!("Adding the non-synced {}", like.track_name()),
        }
        to_add.push(like.track_id().clone());
        liked = likes.advance()?;
    }

    Ok(MergeResult {
        to_add,
        to_remove: BTreeSet::new(),
    })
}

/// Iterator wrapper enforcing the newest-first precondition as it reads.
struct OrderedStream<I> {
    inner: I,
    kind: StreamKind,
    check: bool,
    position: usize,
    previous: Option<DateTime<Utc>>,
}

impl<I, T, E> OrderedStream<I>
where
    I: Iterator<Item = Result<T, E>>,
    T: Entry,
    ReconcileError: From<E>,
{
    fn new(stream: impl IntoIterator<IntoIter = I>, kind: StreamKind, check: bool) -> Self {
        Self {
            inner: stream.into_iter(),
            kind,
            check,
            position: 0,
            previous: None,
        }
    }

    fn advance(&mut self) -> Result<Option<T>, ReconcileError> {
        let Some(entry) = self.inner.next().transpose()? else {
            return Ok(None);
        };
        let current = entry.added_at();
        if self.check {
            if let Some(previous) = self.previous.filter(|previous| current > *previous) {
                return Err(OrderingViolation {
                    stream: self.kind,
                    position: self.position,
                    previous,
                    current,
                }
                .into());
            }
        }
        self.previous = Some(current);
        self.position += 1;
        Ok(Some(entry))
    }
}
