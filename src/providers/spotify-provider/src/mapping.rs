use crate::models::{PlaylistTrack, SavedTrack, SimplifiedPlaylist, SpotifyPage, TrackObject};
use chrono::{DateTime, Utc};
use likesync_core::{
    parse_timestamp, LibraryError, LibraryResult, LikedEntry, Page, PageCursor, Playlist,
    PlaylistEntry, PlaylistId, TrackId,
};

pub fn track_uri(id: &TrackId) -> String {
    format!("spotify:track:{id}")
}

fn playable(track: Option<TrackObject>) -> Option<(TrackId, TrackObject)> {
    let track = track?;
    let id = track.id.clone().filter(|id| !id.is_empty())?;
    Some((TrackId::new(id), track))
}

fn added_at(raw: &str) -> LibraryResult<DateTime<Utc>> {
    parse_timestamp(raw).map_err(|e| LibraryError::InvalidPayload {
        message: e.to_string(),
    })
}

/// Liked song, or `None` for rows without a playable track.
pub fn map_saved_track(item: SavedTrack) -> LibraryResult<Option<LikedEntry>> {
    let Some((track_id, track)) = playable(item.track) else {
        tracing::debug!("Skipping liked row without a track id");
        return Ok(None);
    };
    Ok(Some(LikedEntry {
        track_id,
        track_name: track.name,
        duration_ms: track.duration_ms,
        added_at: added_at(&item.added_at)?,
    }))
}

/// Playlist row; playlists created before Spotify tracked dates report no
/// `added_at`, which maps to the epoch.
pub fn map_playlist_track(item: PlaylistTrack) -> LibraryResult<Option<PlaylistEntry>> {
    let Some((track_id, track)) = playable(item.track) else {
        tracing::debug!("Skipping playlist row without a track id");
        return Ok(None);
    };
    let added_at = match item.added_at.as_deref() {
        Some(raw) => added_at(raw)?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };
    Ok(Some(PlaylistEntry {
        track_id,
        track_name: track.name,
        added_at,
    }))
}

pub fn map_playlist(playlist: SimplifiedPlaylist) -> Playlist {
    Playlist {
        id: PlaylistId::new(playlist.id),
        name: playlist.name,
        owner_id: playlist.owner.id,
        description: playlist.description.filter(|d| !d.is_empty()),
        track_count: playlist.tracks.map(|t| t.total),
    }
}

pub fn map_page<W, T>(
    page: SpotifyPage<W>,
    mut map_item: impl FnMut(W) -> LibraryResult<Option<T>>,
) -> LibraryResult<Page<T>> {
    let mut items = Vec::with_capacity(page.items.len());
    for item in page.items {
        if let Some(mapped) = map_item(item)? {
            items.push(mapped);
        }
    }
    Ok(Page {
        items,
        next: page.next.map(PageCursor::new),
        offset: page.offset,
        limit: page.limit,
        total: page.total,
        href: page.href,
    })
}
