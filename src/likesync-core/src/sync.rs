//! One sync invocation for one user.
//!
//! A [`SyncRun`] resolves the target playlist, reconciles it against the liked
//! songs, and applies the edit in bounded chunks. The liked songs are read at
//! most once per run and cached for reuse by the duplicate pass.

use crate::chunks::{apply_in_chunks, ChunkApplyError, ChunkOperation};
use crate::config::SyncSettings;
use crate::duplicates::{find_duplicates, DuplicatePlan};
use crate::library::{Library, LibraryError, LibraryResult};
use crate::models::{LikedEntry, PageRequest, Playlist, PlaylistEntry, PlaylistId, TrackId};
use crate::paging::{paginate, PagingError};
use crate::reconcile::{reconcile, MergeResult, ReconcileError, SyncMode};
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use thiserror::Error;

pub const PLAYLIST_DESCRIPTION: &str = "All the songs you like - synced by likesync";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Paging(#[from] PagingError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    /// `applied` and `total` count every chunk of the run so far, including
    /// those of operations that completed before `source` failed.
    #[error("run stopped after {applied} of {total} chunks")]
    Apply {
        applied: usize,
        total: usize,
        #[source]
        source: ChunkApplyError,
    },
}

impl SyncError {
    /// Chunks that reached the library before the failure, when known.
    pub fn applied_chunks(&self) -> Option<(usize, usize)> {
        match self {
            SyncError::Apply { applied, total, .. } => Some((*applied, *total)),
            _ => None,
        }
    }

    pub fn failed_operation(&self) -> Option<ChunkOperation> {
        match self {
            SyncError::Apply { source, .. } => Some(source.operation),
            _ => None,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Outcome of syncing the liked songs into a playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Missing only for a dry run against a playlist that does not exist yet.
    pub playlist: Option<PlaylistId>,
    /// Mode that produced the edit; differs from the request after a fallback.
    pub mode: SyncMode,
    pub merge: MergeResult,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn added(&self) -> usize {
        self.merge.to_add.len()
    }

    pub fn removed(&self) -> usize {
        self.merge.to_remove.len()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.merge.is_empty() {
            return f.write_str("Already in sync");
        }
        let mut parts = Vec::new();
        if self.added() > 0 {
            parts.push(format!("Added {}", self.added()));
        }
        if self.removed() > 0 {
            parts.push(format!("Removed {}", self.removed()));
        }
        let prefix = if self.dry_run { "Would have: " } else { "" };
        write!(f, "{prefix}{} songs", parts.join(" / "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReport {
    pub plan: DuplicatePlan,
    pub unliked: usize,
    pub dry_run: bool,
}

/// Liked songs materialized once per run.
#[derive(Debug, Default)]
struct LikesCache {
    entries: Vec<LikedEntry>,
    materialized: bool,
}

pub struct SyncRun<'a, L: Library + ?Sized> {
    library: &'a L,
    settings: SyncSettings,
    likes: LikesCache,
    applied_chunks: usize,
}

impl<'a, L: Library + ?Sized> SyncRun<'a, L> {
    pub fn new(library: &'a L, settings: SyncSettings) -> Self {
        Self {
            library,
            settings,
            likes: LikesCache::default(),
            applied_chunks: 0,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn chunk_size(&self, operation: ChunkOperation) -> usize {
        self.settings
            .chunk_size
            .min(self.library.max_batch_size(operation))
            .max(1)
    }

    /// Mutation chunks this run has applied so far.
    pub fn applied_chunks(&self) -> usize {
        self.applied_chunks
    }

    fn apply_chunked<T, F>(
        &mut self,
        operation: ChunkOperation,
        items: &[T],
        apply: F,
    ) -> SyncResult<()>
    where
        F: FnMut(&[T]) -> LibraryResult<()>,
    {
        let earlier = self.applied_chunks;
        match apply_in_chunks(operation, items, self.chunk_size(operation), apply) {
            Ok(applied) => {
                self.applied_chunks += applied;
                Ok(())
            }
            Err(source) => {
                self.applied_chunks += source.applied;
                Err(SyncError::Apply {
                    applied: earlier + source.applied,
                    total: earlier + source.total,
                    source,
                })
            }
        }
    }

    fn first_page(&self) -> PageRequest {
        PageRequest::first_page(self.settings.page_size)
    }

    /// Every liked song, read from the library on first use.
    pub fn cached_likes(&mut self) -> SyncResult<&[LikedEntry]> {
        if !self.likes.materialized {
            tracing::debug!("Getting user likes");
            let library = self.library;
            let first = library.liked_tracks(self.first_page())?;
            let entries = paginate(first, |cursor| library.next_liked_page(cursor))
                .with_loop_window(self.settings.loop_window)
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!("Cached {} likes", entries.len());
            self.likes = LikesCache {
                entries,
                materialized: true,
            };
        }
        Ok(&self.likes.entries)
    }

    /// Playlists owned by the current user and called `name`, in listing order.
    fn owned_playlists_named(&self, name: &str) -> SyncResult<(String, Vec<Playlist>)> {
        let library = self.library;
        let user_id = library.current_user_id()?;
        let first = library.list_playlists(self.first_page())?;
        let mut same_name = Vec::new();
        for playlist in paginate(first, |cursor| library.next_playlists_page(cursor))
            .with_loop_window(self.settings.loop_window)
        {
            let playlist = playlist?;
            if playlist.owner_id == user_id && playlist.name == name {
                same_name.push(playlist);
            }
        }
        Ok((user_id, same_name))
    }

    /// Find the user's playlist called `name`, creating it when missing.
    ///
    /// When several owned playlists share the name, the last one listed is
    /// kept and the others are unfollowed if pruning is enabled.
    pub fn resolve_playlist(&self, name: &str) -> SyncResult<Playlist> {
        let (user_id, mut same_name) = self.owned_playlists_named(name)?;
        let Some(target) = same_name.pop() else {
            tracing::info!("Creating a new playlist: {name}");
            return Ok(self
                .library
                .create_playlist(&user_id, name, PLAYLIST_DESCRIPTION)?);
        };

        if !same_name.is_empty() {
            tracing::warn!(
                "Found {} playlists named '{name}', keeping {}",
                same_name.len() + 1,
                target.id
            );
            if self.settings.prune_duplicate_playlists {
                for duplicate in &same_name {
                    tracing::debug!("Removing duplicated playlist {}", duplicate.id);
                    self.library.unfollow_playlist(&duplicate.id)?;
                }
            }
        }
        Ok(target)
    }

    /// Compute the edit for `playlist` without applying it.
    ///
    /// `None` stands for a playlist that does not exist yet.
    pub fn plan(
        &mut self,
        playlist: Option<&PlaylistId>,
        mode: SyncMode,
    ) -> SyncResult<(SyncMode, MergeResult)> {
        match self.merge(playlist, mode) {
            Err(SyncError::Reconcile(ReconcileError::Ordering(violation)))
                if mode == SyncMode::Fast && self.settings.fallback_to_full =>
            {
                tracing::warn!("Fast sync aborted ({violation}), falling back to a full sync");
                Ok((SyncMode::Full, self.merge(playlist, SyncMode::Full)?))
            }
            other => other.map(|merge| (mode, merge)),
        }
    }

    fn merge(&mut self, playlist: Option<&PlaylistId>, mode: SyncMode) -> SyncResult<MergeResult> {
        let options = self.settings.reconcile_options();
        let loop_window = self.settings.loop_window;
        if mode == SyncMode::Full {
            self.cached_likes()?;
        }

        let library = self.library;
        let playlist_items: Box<dyn Iterator<Item = Result<PlaylistEntry, PagingError>> + 'a> =
            match playlist {
                Some(id) => {
                    let first = library.playlist_entries(id, self.first_page())?;
                    Box::new(
                        paginate(first, move |cursor| library.next_playlist_page(cursor))
                            .with_loop_window(loop_window),
                    )
                }
                None => Box::new(std::iter::empty()),
            };

        let merge = if self.likes.materialized {
            let likes = self.likes.entries.iter().map(Ok::<_, Infallible>);
            reconcile(likes, playlist_items, mode, &options)?
        } else {
            let likes_first = library.liked_tracks(self.first_page())?;
            let likes = paginate(likes_first, |cursor| library.next_liked_page(cursor))
                .with_loop_window(loop_window);
            reconcile(likes, playlist_items, mode, &options)?
        };
        Ok(merge)
    }

    /// Push `merge` to the playlist: additions go to the head, newest last.
    pub fn apply(&mut self, playlist: &PlaylistId, merge: &MergeResult) -> SyncResult<()> {
        let library = self.library;
        self.apply_chunked(ChunkOperation::AddToPlaylist, &merge.to_add, |chunk| {
            library.add_to_playlist(playlist, chunk, true)
        })?;

        let to_remove: Vec<TrackId> = merge.to_remove.iter().cloned().collect();
        self.apply_chunked(ChunkOperation::RemoveFromPlaylist, &to_remove, |chunk| {
            library.remove_from_playlist(playlist, chunk)
        })
    }

    /// Make the playlist called `name` mirror the liked songs.
    ///
    /// A dry run neither creates, prunes nor edits playlists.
    pub fn sync_liked_with_playlist(
        &mut self,
        name: &str,
        mode: SyncMode,
        dry_run: bool,
    ) -> SyncResult<SyncReport> {
        let playlist = if dry_run {
            self.owned_playlists_named(name)?.1.pop()
        } else {
            Some(self.resolve_playlist(name)?)
        };
        let playlist_id = playlist.map(|p| p.id);

        let (mode, merge) = self.plan(playlist_id.as_ref(), mode)?;
        if let (Some(id), false) = (&playlist_id, dry_run) {
            self.apply(id, &merge)?;
        }
        let report = SyncReport {
            playlist: playlist_id,
            mode,
            merge,
            dry_run,
        };
        tracing::info!("{mode} sync of '{name}': {report}");
        Ok(report)
    }

    /// Unlike older versions of recordings liked more than once.
    pub fn remove_liked_duplicates(&mut self, dry_run: bool) -> SyncResult<DuplicateReport> {
        let plan = find_duplicates(self.cached_likes()?);
        for group in &plan.groups {
            tracing::warn!("{group}");
        }

        let to_unlike = plan.to_unlike();
        if dry_run || to_unlike.is_empty() {
            return Ok(DuplicateReport {
                plan,
                unliked: 0,
                dry_run,
            });
        }

        tracing::debug!("Unlike {} songs", to_unlike.len());
        let library = self.library;
        self.apply_chunked(ChunkOperation::Unlike, &to_unlike, |chunk| {
            library.unlike_tracks(chunk)
        })?;

        let unliked: HashSet<&TrackId> = to_unlike.iter().collect();
        self.likes
            .entries
            .retain(|like| !unliked.contains(&like.track_id));

        Ok(DuplicateReport {
            plan,
            unliked: to_unlike.len(),
            dry_run,
        })
    }
}
