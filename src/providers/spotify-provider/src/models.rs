//! Spotify Web API payloads.

use serde::{Deserialize, Serialize};

/// Paging object wrapping every list endpoint.
#[derive(Debug, Deserialize)]
pub struct SpotifyPage<T> {
    #[serde(default)]
    pub href: Option<String>,
    pub items: Vec<T>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
}

/// Item of `GET me/tracks`.
#[derive(Debug, Deserialize)]
pub struct SavedTrack {
    pub added_at: String,
    #[serde(default)]
    pub track: Option<TrackObject>,
}

/// Item of `GET playlists/{id}/tracks`.
#[derive(Debug, Deserialize)]
pub struct PlaylistTrack {
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
pub struct TrackObject {
    /// Null for local files and unavailable episodes.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
    pub owner: PublicUser,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tracks: Option<TracksRef>,
}

#[derive(Debug, Deserialize)]
pub struct TracksRef {
    pub total: u32,
}

#[derive(Debug, Deserialize)]
pub struct PublicUser {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct AddTracksBody {
    pub uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RemoveTracksBody {
    pub tracks: Vec<TrackUri>,
}

#[derive(Debug, Serialize)]
pub struct TrackUri {
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub struct TrackIdsBody<'a> {
    pub ids: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct CreatePlaylistBody<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}
