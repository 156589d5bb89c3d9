use crate::chunks::ChunkOperation;
use crate::models::{
    LikedEntry, Page, PageCursor, PageRequest, Playlist, PlaylistEntry, PlaylistId, TrackId,
};
use thiserror::Error;

/// Common categories of remote library failures surfaced to the sync run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("network error: {message}")]
    Network { message: String },
    #[error("authentication error: {message}")]
    Authentication { message: String },
    #[error("entity not found: {entity}")]
    NotFound { entity: String },
    #[error("rate limited{}", .retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("invalid payload: {message}")]
    InvalidPayload { message: String },
    #[error("{message}")]
    Other { message: String },
}

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Remote music library holding the user's liked songs and playlists.
///
/// Every method is a blocking remote call. Implementations neither retry nor
/// reorder: listings come back exactly as the service returns them, newest
/// first, and mutations are applied once.
pub trait Library: Send + Sync {
    /// Stable library identifier (e.g., "spotify").
    fn id(&self) -> &str;

    /// Human-friendly library name.
    fn name(&self) -> &str;

    /// Largest number of ids a single `operation` call accepts.
    fn max_batch_size(&self, operation: ChunkOperation) -> usize;

    fn current_user_id(&self) -> LibraryResult<String>;

    fn liked_tracks(&self, paging: PageRequest) -> LibraryResult<Page<LikedEntry>>;

    fn next_liked_page(&self, cursor: &PageCursor) -> LibraryResult<Page<LikedEntry>>;

    fn playlist_entries(
        &self,
        playlist_id: &PlaylistId,
        paging: PageRequest,
    ) -> LibraryResult<Page<PlaylistEntry>>;

    fn next_playlist_page(&self, cursor: &PageCursor) -> LibraryResult<Page<PlaylistEntry>>;

    fn list_playlists(&self, paging: PageRequest) -> LibraryResult<Page<Playlist>>;

    fn next_playlists_page(&self, cursor: &PageCursor) -> LibraryResult<Page<Playlist>>;

    fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> LibraryResult<Playlist>;

    fn unfollow_playlist(&self, playlist_id: &PlaylistId) -> LibraryResult<()>;

    /// Adds `track_ids` in the given order, either at the head or the tail.
    fn add_to_playlist(
        &self,
        playlist_id: &PlaylistId,
        track_ids: &[TrackId],
        insert_at_head: bool,
    ) -> LibraryResult<()>;

    /// Removes every occurrence of each id.
    fn remove_from_playlist(&self, playlist_id: &PlaylistId, track_ids: &[TrackId])
        -> LibraryResult<()>;

    fn unlike_tracks(&self, track_ids: &[TrackId]) -> LibraryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_mentions_retry_after() {
        let err = LibraryError::RateLimited {
            retry_after_secs: Some(3),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 3s");

        let err = LibraryError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "rate limited");
    }
}
