//! In-process [`Library`] used by tests and dry runs.
//!
//! Pages are addressed with URL-like cursors (`me/tracks?offset=50&limit=50`)
//! so continuation behaves like the remote service: the cursor alone is enough
//! to fetch the next page.

use crate::chunks::ChunkOperation;
use crate::library::{Library, LibraryError, LibraryResult};
use crate::models::{
    LikedEntry, Page, PageCursor, PageRequest, Playlist, PlaylistEntry, PlaylistId, TrackId,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

const DEFAULT_BATCH_SIZE: usize = 100;

/// Mutation observed by a [`MemoryLibrary`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryCall {
    CreatePlaylist {
        name: String,
    },
    UnfollowPlaylist(PlaylistId),
    AddToPlaylist {
        playlist: PlaylistId,
        track_ids: Vec<TrackId>,
        insert_at_head: bool,
    },
    RemoveFromPlaylist {
        playlist: PlaylistId,
        track_ids: Vec<TrackId>,
    },
    Unlike(Vec<TrackId>),
}

#[derive(Debug, Clone)]
struct StoredPlaylist {
    meta: Playlist,
    entries: Vec<PlaylistEntry>,
}

#[derive(Debug, Default)]
struct MemoryState {
    likes: Vec<LikedEntry>,
    playlists: Vec<StoredPlaylist>,
    calls: Vec<LibraryCall>,
    created: usize,
    fail_after: Option<usize>,
    stuck_cursor: bool,
}

pub struct MemoryLibrary {
    user_id: String,
    max_batch_size: usize,
    state: Mutex<MemoryState>,
}

impl MemoryLibrary {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            max_batch_size: DEFAULT_BATCH_SIZE,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Liked songs as the service would list them, newest first.
    pub fn with_likes(self, likes: Vec<LikedEntry>) -> Self {
        self.lock().likes = likes;
        self
    }

    pub fn with_playlist(self, playlist: Playlist, entries: Vec<PlaylistEntry>) -> Self {
        self.lock().playlists.push(StoredPlaylist {
            meta: playlist,
            entries,
        });
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Reject every mutation after the first `count` succeed.
    pub fn fail_after_mutations(self, count: usize) -> Self {
        self.lock().fail_after = Some(count);
        self
    }

    /// Make every continuation cursor point back at the second page.
    pub fn with_stuck_cursor(self) -> Self {
        self.lock().stuck_cursor = true;
        self
    }

    pub fn likes(&self) -> Vec<LikedEntry> {
        self.lock().likes.clone()
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.lock()
            .playlists
            .iter()
            .map(StoredPlaylist::listing)
            .collect()
    }

    pub fn playlist_track_ids(&self, playlist_id: &PlaylistId) -> Option<Vec<TrackId>> {
        self.lock()
            .playlists
            .iter()
            .find(|p| &p.meta.id == playlist_id)
            .map(|p| p.entries.iter().map(|e| e.track_id.clone()).collect())
    }

    pub fn calls(&self) -> Vec<LibraryCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<T>(
        &self,
        call: LibraryCall,
        apply: impl FnOnce(&mut MemoryState) -> LibraryResult<T>,
    ) -> LibraryResult<T> {
        let mut state = self.lock();
        if let Some(limit) = state.fail_after {
            if state.calls.len() >= limit {
                return Err(LibraryError::Other {
                    message: format!("injected failure after {limit} mutations"),
                });
            }
        }
        let result = apply(&mut *state)?;
        state.calls.push(call);
        Ok(result)
    }

    fn page_of<T: Clone>(&self, items: &[T], scope: &str, request: PageRequest) -> Page<T> {
        let stuck = self.lock().stuck_cursor;
        let limit = request.limit.max(1) as usize;
        let offset = request.offset as usize;
        let total = items.len();
        let end = offset.saturating_add(limit).min(total);
        let slice = items.get(offset..end).unwrap_or_default().to_vec();

        let next = if stuck && total > limit {
            Some(cursor(scope, limit, limit))
        } else if end < total {
            Some(cursor(scope, end, limit))
        } else {
            None
        };

        Page {
            items: slice,
            next,
            offset: Some(request.offset),
            limit: Some(limit as u32),
            total: Some(total as u32),
            href: Some(cursor(scope, offset, limit).0),
        }
    }

    fn playlist_scope(playlist_id: &PlaylistId) -> String {
        format!("playlists/{playlist_id}/tracks")
    }
}

impl StoredPlaylist {
    fn listing(&self) -> Playlist {
        Playlist {
            track_count: Some(self.entries.len() as u32),
            ..self.meta.clone()
        }
    }
}

fn cursor(scope: &str, offset: usize, limit: usize) -> PageCursor {
    PageCursor::new(format!("{scope}?offset={offset}&limit={limit}"))
}

fn parse_cursor(cursor: &PageCursor) -> LibraryResult<(&str, PageRequest)> {
    let invalid = || LibraryError::InvalidPayload {
        message: format!("malformed cursor '{cursor}'"),
    };
    let (scope, query) = cursor.as_ref().split_once('?').ok_or_else(invalid)?;
    let mut request = PageRequest::first_page(DEFAULT_BATCH_SIZE as u32);
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').ok_or_else(invalid)?;
        let value: u32 = value.parse().map_err(|_| invalid())?;
        match key {
            "offset" => request.offset = value,
            "limit" => request.limit = value,
            _ => return Err(invalid()),
        }
    }
    Ok((scope, request))
}

fn missing_playlist(playlist_id: &PlaylistId) -> LibraryError {
    LibraryError::NotFound {
        entity: format!("playlist {playlist_id}"),
    }
}

fn find_playlist<'s>(
    state: &'s mut MemoryState,
    playlist_id: &PlaylistId,
) -> LibraryResult<&'s mut StoredPlaylist> {
    state
        .playlists
        .iter_mut()
        .find(|p| &p.meta.id == playlist_id)
        .ok_or_else(|| missing_playlist(playlist_id))
}

impl Library for MemoryLibrary {
    fn id(&self) -> &str {
        "memory"
    }

    fn name(&self) -> &str {
        "In-memory library"
    }

    fn max_batch_size(&self, _operation: ChunkOperation) -> usize {
        self.max_batch_size
    }

    fn current_user_id(&self) -> LibraryResult<String> {
        Ok(self.user_id.clone())
    }

    fn liked_tracks(&self, paging: PageRequest) -> LibraryResult<Page<LikedEntry>> {
        let likes = self.lock().likes.clone();
        Ok(self.page_of(&likes, "me/tracks", paging))
    }

    fn next_liked_page(&self, cursor: &PageCursor) -> LibraryResult<Page<LikedEntry>> {
        let (scope, request) = parse_cursor(cursor)?;
        if scope != "me/tracks" {
            return Err(LibraryError::InvalidPayload {
                message: format!("cursor '{cursor}' does not list liked songs"),
            });
        }
        self.liked_tracks(request)
    }

    fn playlist_entries(
        &self,
        playlist_id: &PlaylistId,
        paging: PageRequest,
    ) -> LibraryResult<Page<PlaylistEntry>> {
        let entries = self
            .lock()
            .playlists
            .iter()
            .find(|p| &p.meta.id == playlist_id)
            .map(|p| p.entries.clone())
            .ok_or_else(|| missing_playlist(playlist_id))?;
        Ok(self.page_of(&entries, &Self::playlist_scope(playlist_id), paging))
    }

    fn next_playlist_page(&self, cursor: &PageCursor) -> LibraryResult<Page<PlaylistEntry>> {
        let (scope, request) = parse_cursor(cursor)?;
        let playlist_id = scope
            .strip_prefix("playlists/")
            .and_then(|rest| rest.strip_suffix("/tracks"))
            .ok_or_else(|| LibraryError::InvalidPayload {
                message: format!("cursor '{cursor}' does not list a playlist"),
            })?;
        self.playlist_entries(&PlaylistId::new(playlist_id), request)
    }

    fn list_playlists(&self, paging: PageRequest) -> LibraryResult<Page<Playlist>> {
        Ok(self.page_of(&self.playlists(), "me/playlists", paging))
    }

    fn next_playlists_page(&self, cursor: &PageCursor) -> LibraryResult<Page<Playlist>> {
        let (scope, request) = parse_cursor(cursor)?;
        if scope != "me/playlists" {
            return Err(LibraryError::InvalidPayload {
                message: format!("cursor '{cursor}' does not list playlists"),
            });
        }
        self.list_playlists(request)
    }

    fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> LibraryResult<Playlist> {
        let call = LibraryCall::CreatePlaylist {
            name: name.to_string(),
        };
        self.mutate(call, |state| {
            state.created += 1;
            let playlist = Playlist {
                id: PlaylistId::new(format!("memory-playlist-{}", state.created)),
                name: name.to_string(),
                owner_id: user_id.to_string(),
                description: Some(description.to_string()),
                track_count: Some(0),
            };
            state.playlists.push(StoredPlaylist {
                meta: playlist.clone(),
                entries: Vec::new(),
            });
            Ok(playlist)
        })
    }

    fn unfollow_playlist(&self, playlist_id: &PlaylistId) -> LibraryResult<()> {
        self.mutate(LibraryCall::UnfollowPlaylist(playlist_id.clone()), |state| {
            let before = state.playlists.len();
            state.playlists.retain(|p| &p.meta.id != playlist_id);
            if state.playlists.len() == before {
                return Err(missing_playlist(playlist_id));
            }
            Ok(())
        })
    }

    fn add_to_playlist(
        &self,
        playlist_id: &PlaylistId,
        track_ids: &[TrackId],
        insert_at_head: bool,
    ) -> LibraryResult<()> {
        let call = LibraryCall::AddToPlaylist {
            playlist: playlist_id.clone(),
            track_ids: track_ids.to_vec(),
            insert_at_head,
        };
        self.mutate(call, |state| {
            let now = Utc::now();
            let names: Vec<String> = track_ids
                .iter()
                .map(|id| {
                    state
                        .likes
                        .iter()
                        .find(|like| &like.track_id == id)
                        .map(|like| like.track_name.clone())
                        .unwrap_or_else(|| id.to_string())
                })
                .collect();
            let playlist = find_playlist(state, playlist_id)?;
            let added: Vec<PlaylistEntry> = track_ids
                .iter()
                .zip(names)
                .map(|(id, track_name)| PlaylistEntry {
                    track_id: id.clone(),
                    track_name,
                    added_at: now,
                })
                .collect();
            if insert_at_head {
                let existing = std::mem::replace(&mut playlist.entries, added);
                playlist.entries.extend(existing);
            } else {
                playlist.entries.extend(added);
            }
            Ok(())
        })
    }

    fn remove_from_playlist(
        &self,
        playlist_id: &PlaylistId,
        track_ids: &[TrackId],
    ) -> LibraryResult<()> {
        let call = LibraryCall::RemoveFromPlaylist {
            playlist: playlist_id.clone(),
            track_ids: track_ids.to_vec(),
        };
        self.mutate(call, |state| {
            let playlist = find_playlist(state, playlist_id)?;
            let removed: HashSet<&TrackId> = track_ids.iter().collect();
            playlist
                .entries
                .retain(|entry| !removed.contains(&entry.track_id));
            Ok(())
        })
    }

    fn unlike_tracks(&self, track_ids: &[TrackId]) -> LibraryResult<()> {
        self.mutate(LibraryCall::Unlike(track_ids.to_vec()), |state| {
            let removed: HashSet<&TrackId> = track_ids.iter().collect();
            state.likes.retain(|like| !removed.contains(&like.track_id));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_timestamp;
    use crate::paging::{paginate, PagingError};

    fn like(id: &str, added_at: &str) -> LikedEntry {
        LikedEntry {
            track_id: TrackId::new(id),
            track_name: format!("Song {id}"),
            duration_ms: 200_000,
            added_at: parse_timestamp(added_at).expect("timestamp"),
        }
    }

    fn playlist(id: &str, name: &str) -> Playlist {
        Playlist {
            id: PlaylistId::new(id),
            name: name.to_string(),
            owner_id: "me".to_string(),
            description: None,
            track_count: None,
        }
    }

    fn likes(count: usize) -> Vec<LikedEntry> {
        (0..count)
            .map(|i| like(&format!("t{i}"), &format!("2021-01-{:02}", 28 - i)))
            .collect()
    }

    #[test]
    fn liked_pages_follow_cursors() {
        let library = MemoryLibrary::new("me").with_likes(likes(5));
        let first = library
            .liked_tracks(PageRequest::first_page(2))
            .expect("first page");
        assert_eq!(
            first.next,
            Some(PageCursor::new("me/tracks?offset=2&limit=2"))
        );

        let ids: Vec<String> = paginate(first, |c| library.next_liked_page(c))
            .map(|like| like.expect("like").track_id.0)
            .collect();
        assert_eq!(ids, vec!["t0", "t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn stuck_cursor_is_caught_by_paging() {
        let library = MemoryLibrary::new("me")
            .with_likes(likes(6))
            .with_stuck_cursor();
        let first = library
            .liked_tracks(PageRequest::first_page(2))
            .expect("first page");
        let result: Result<Vec<_>, _> = paginate(first, |c| library.next_liked_page(c)).collect();
        assert!(matches!(result, Err(PagingError::Loop(_))));
    }

    #[test]
    fn head_insert_keeps_chunk_order() {
        let pl = PlaylistId::new("pl");
        let library = MemoryLibrary::new("me").with_playlist(
            playlist("pl", "Likes"),
            vec![PlaylistEntry {
                track_id: TrackId::new("old"),
                track_name: "Old".into(),
                added_at: parse_timestamp("2020").expect("timestamp"),
            }],
        );
        library
            .add_to_playlist(&pl, &[TrackId::new("c"), TrackId::new("d")], true)
            .expect("add");
        library
            .add_to_playlist(&pl, &[TrackId::new("a"), TrackId::new("b")], true)
            .expect("add");
        library
            .add_to_playlist(&pl, &[TrackId::new("z")], false)
            .expect("append");

        let ids: Vec<String> = library
            .playlist_track_ids(&pl)
            .expect("playlist")
            .into_iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "old", "z"]);
    }

    #[test]
    fn remove_drops_every_occurrence() {
        let pl = PlaylistId::new("pl");
        let entry = |id: &str| PlaylistEntry {
            track_id: TrackId::new(id),
            track_name: id.to_string(),
            added_at: parse_timestamp("2020").expect("timestamp"),
        };
        let library = MemoryLibrary::new("me").with_playlist(
            playlist("pl", "Likes"),
            vec![entry("a"), entry("b"), entry("a")],
        );
        library
            .remove_from_playlist(&pl, &[TrackId::new("a")])
            .expect("remove");
        assert_eq!(library.playlist_track_ids(&pl), Some(vec![TrackId::new("b")]));
    }

    #[test]
    fn injected_failure_stops_mutations() {
        let library = MemoryLibrary::new("me")
            .with_likes(likes(3))
            .fail_after_mutations(1);
        library.unlike_tracks(&[TrackId::new("t0")]).expect("first");
        let err = library
            .unlike_tracks(&[TrackId::new("t1")])
            .expect_err("second should fail");
        assert!(matches!(err, LibraryError::Other { .. }));
        assert_eq!(library.likes().len(), 2);
        assert_eq!(library.calls(), vec![LibraryCall::Unlike(vec![TrackId::new("t0")])]);
    }

    #[test]
    fn unknown_playlist_is_not_found() {
        let library = MemoryLibrary::new("me");
        let err = library
            .playlist_entries(&PlaylistId::new("nope"), PageRequest::first_page(10))
            .expect_err("missing playlist");
        assert!(matches!(err, LibraryError::NotFound { .. }));
        assert!(library
            .next_liked_page(&PageCursor::new("garbage"))
            .is_err());
    }
}
