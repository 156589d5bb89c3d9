mod mapping;
pub mod models;

use likesync_core::{
    ChunkOperation, Library, LibraryError, LibraryResult, LikedEntry, Page, PageCursor,
    PageRequest, Playlist, PlaylistEntry, PlaylistId, SpotifyConfig, TrackId,
};
use mapping::{map_page, map_playlist, map_playlist_track, map_saved_track, track_uri};
use models::{
    AddTracksBody, CreatePlaylistBody, PlaylistTrack, RemoveTracksBody, SavedTrack,
    SimplifiedPlaylist, SpotifyPage, TrackIdsBody, TrackUri,
};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1/";

const MAX_LIKED_PAGE: u32 = 50;
const MAX_PLAYLIST_PAGE: u32 = 100;
const MAX_PLAYLISTS_PAGE: u32 = 50;
const MAX_PLAYLIST_BATCH: usize = 100;
const MAX_UNLIKE_BATCH: usize = 50;

#[derive(Clone)]
pub struct SpotifyOptions {
    pub base_url: String,
    pub access_token: String,
    pub request_timeout: Duration,
}

impl SpotifyOptions {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: SPOTIFY_API_BASE.to_string(),
            access_token: access_token.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Options from the `[spotify]` config section; `access_token` wins over
    /// the token stored there.
    pub fn from_config(config: &SpotifyConfig, access_token: impl Into<String>) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            access_token: access_token.into(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
}

pub struct SpotifyLibrary {
    client: Client,
    base_url: Url,
    access_token: String,
}

impl SpotifyLibrary {
    pub fn new(options: SpotifyOptions) -> LibraryResult<Self> {
        let mut base = options.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| LibraryError::Other {
            message: format!("invalid base_url: {e}"),
        })?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| LibraryError::Other {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url,
            access_token: options.access_token,
        })
    }

    fn endpoint(&self, path: &str) -> LibraryResult<Url> {
        self.base_url.join(path).map_err(|e| LibraryError::Other {
            message: format!("invalid endpoint {path}: {e}"),
        })
    }

    fn paged_endpoint(&self, path: &str, paging: PageRequest, max_limit: u32) -> LibraryResult<Url> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .append_pair("offset", &paging.offset.to_string())
            .append_pair("limit", &paging.limit.clamp(1, max_limit).to_string());
        Ok(url)
    }

    fn cursor_url(cursor: &PageCursor) -> LibraryResult<Url> {
        Url::parse(cursor.as_ref()).map_err(|e| LibraryError::InvalidPayload {
            message: format!("invalid next url '{cursor}': {e}"),
        })
    }

    fn send(&self, request: RequestBuilder, entity: &str) -> LibraryResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .map_err(|e| LibraryError::Network {
                message: e.to_string(),
            })?;
        check_status(response, entity)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url, entity: &str) -> LibraryResult<T> {
        tracing::debug!("GET {url}");
        let response = self.send(self.client.get(url), entity)?;
        response.json().map_err(|e| LibraryError::InvalidPayload {
            message: format!("{entity}: {e}"),
        })
    }

    fn liked_page(&self, url: Url) -> LibraryResult<Page<LikedEntry>> {
        let page: SpotifyPage<SavedTrack> = self.get_json(url, "liked songs")?;
        map_page(page, map_saved_track)
    }

    fn playlist_page(&self, url: Url, entity: &str) -> LibraryResult<Page<PlaylistEntry>> {
        let page: SpotifyPage<PlaylistTrack> = self.get_json(url, entity)?;
        map_page(page, map_playlist_track)
    }

    fn playlists_page(&self, url: Url) -> LibraryResult<Page<Playlist>> {
        let page: SpotifyPage<SimplifiedPlaylist> = self.get_json(url, "playlists")?;
        map_page(page, |playlist| Ok(Some(map_playlist(playlist))))
    }

    fn playlist_tracks_url(&self, playlist_id: &PlaylistId) -> LibraryResult<Url> {
        self.endpoint(&format!("playlists/{playlist_id}/tracks"))
    }
}

fn check_status(response: Response, entity: &str) -> LibraryResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(LibraryError::Authentication {
            message: response.text().unwrap_or_else(|_| status.to_string()),
        }),
        StatusCode::NOT_FOUND => Err(LibraryError::NotFound {
            entity: entity.to_string(),
        }),
        StatusCode::TOO_MANY_REQUESTS => Err(LibraryError::RateLimited {
            retry_after_secs: response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok()),
        }),
        _ => {
            let body = response.text().unwrap_or_default();
            Err(LibraryError::Other {
                message: format!("{entity}: {status} {body}"),
            })
        }
    }
}

impl Library for SpotifyLibrary {
    fn id(&self) -> &str {
        "spotify"
    }

    fn name(&self) -> &str {
        "Spotify"
    }

    fn max_batch_size(&self, operation: ChunkOperation) -> usize {
        match operation {
            ChunkOperation::AddToPlaylist | ChunkOperation::RemoveFromPlaylist => {
                MAX_PLAYLIST_BATCH
            }
            ChunkOperation::Unlike => MAX_UNLIKE_BATCH,
        }
    }

    fn current_user_id(&self) -> LibraryResult<String> {
        let user: CurrentUser = self.get_json(self.endpoint("me")?, "current user")?;
        Ok(user.id)
    }

    fn liked_tracks(&self, paging: PageRequest) -> LibraryResult<Page<LikedEntry>> {
        self.liked_page(self.paged_endpoint("me/tracks", paging, MAX_LIKED_PAGE)?)
    }

    fn next_liked_page(&self, cursor: &PageCursor) -> LibraryResult<Page<LikedEntry>> {
        self.liked_page(Self::cursor_url(cursor)?)
    }

    fn playlist_entries(
        &self,
        playlist_id: &PlaylistId,
        paging: PageRequest,
    ) -> LibraryResult<Page<PlaylistEntry>> {
        let url = self.paged_endpoint(
            &format!("playlists/{playlist_id}/tracks"),
            paging,
            MAX_PLAYLIST_PAGE,
        )?;
        self.playlist_page(url, &format!("playlist {playlist_id}"))
    }

    fn next_playlist_page(&self, cursor: &PageCursor) -> LibraryResult<Page<PlaylistEntry>> {
        self.playlist_page(Self::cursor_url(cursor)?, "playlist")
    }

    fn list_playlists(&self, paging: PageRequest) -> LibraryResult<Page<Playlist>> {
        self.playlists_page(self.paged_endpoint("me/playlists", paging, MAX_PLAYLISTS_PAGE)?)
    }

    fn next_playlists_page(&self, cursor: &PageCursor) -> LibraryResult<Page<Playlist>> {
        self.playlists_page(Self::cursor_url(cursor)?)
    }

    fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> LibraryResult<Playlist> {
        let url = self.endpoint(&format!("users/{user_id}/playlists"))?;
        let body = CreatePlaylistBody {
            name,
            description,
            public: false,
        };
        tracing::debug!("POST {url}");
        let response = self.send(self.client.post(url).json(&body), "user")?;
        let created: SimplifiedPlaylist =
            response.json().map_err(|e| LibraryError::InvalidPayload {
                message: format!("created playlist: {e}"),
            })?;
        Ok(map_playlist(created))
    }

    fn unfollow_playlist(&self, playlist_id: &PlaylistId) -> LibraryResult<()> {
        let url = self.endpoint(&format!("playlists/{playlist_id}/followers"))?;
        tracing::debug!("DELETE {url}");
        self.send(self.client.delete(url), &format!("playlist {playlist_id}"))?;
        Ok(())
    }

    fn add_to_playlist(
        &self,
        playlist_id: &PlaylistId,
        track_ids: &[TrackId],
        insert_at_head: bool,
    ) -> LibraryResult<()> {
        let url = self.playlist_tracks_url(playlist_id)?;
        let body = AddTracksBody {
            uris: track_ids.iter().map(track_uri).collect(),
            position: insert_at_head.then_some(0),
        };
        tracing::debug!("POST {url} with {} tracks", track_ids.len());
        self.send(
            self.client.post(url).json(&body),
            &format!("playlist {playlist_id}"),
        )?;
        Ok(())
    }

    fn remove_from_playlist(
        &self,
        playlist_id: &PlaylistId,
        track_ids: &[TrackId],
    ) -> LibraryResult<()> {
        let url = self.playlist_tracks_url(playlist_id)?;
        let body = RemoveTracksBody {
            tracks: track_ids
                .iter()
                .map(|id| TrackUri { uri: track_uri(id) })
                .collect(),
        };
        tracing::debug!("DELETE {url} with {} tracks", track_ids.len());
        self.send(
            self.client.delete(url).json(&body),
            &format!("playlist {playlist_id}"),
        )?;
        Ok(())
    }

    fn unlike_tracks(&self, track_ids: &[TrackId]) -> LibraryResult<()> {
        let url = self.endpoint("me/tracks")?;
        let body = TrackIdsBody {
            ids: track_ids.iter().map(|id| id.0.as_str()).collect(),
        };
        tracing::debug!("DELETE {url} with {} tracks", track_ids.len());
        self.send(self.client.delete(url).json(&body), "liked songs")?;
        Ok(())
    }
}
