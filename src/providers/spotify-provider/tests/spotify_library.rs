use likesync_core::{
    paginate, run_library_contract, Library, LibraryContractExpectations, LibraryError,
    PageRequest, PlaylistId, SyncMode, SyncRun, SyncSettings, TrackId,
};
use serde_json::{json, Value};
use spotify_provider::{SpotifyLibrary, SpotifyOptions};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

fn library_for(base_url: String) -> SpotifyLibrary {
    SpotifyLibrary::new(SpotifyOptions {
        base_url,
        access_token: "test-token".into(),
        request_timeout: Duration::from_secs(5),
    })
    .expect("library")
}

/// The blocking client must be created, used and dropped off the async runtime.
async fn blocking<T, F>(work: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .expect("blocking task")
}

fn track(id: &str) -> Value {
    json!({ "id": id, "name": format!("Song {id}"), "duration_ms": 180000 })
}

fn saved(id: &str, added_at: &str) -> Value {
    json!({ "added_at": added_at, "track": track(id) })
}

fn page(uri: &str, endpoint: &str, items: Vec<Value>, offset: u32, next: Option<u32>) -> Value {
    json!({
        "href": format!("{uri}/{endpoint}?offset={offset}&limit=2"),
        "items": items,
        "limit": 2,
        "next": next.map(|n| format!("{uri}/{endpoint}?offset={n}&limit=2")),
        "offset": offset,
        "total": 4,
    })
}

fn playlist_object(id: &str, name: &str, owner: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "owner": { "id": owner },
        "description": "",
        "tracks": { "total": 2 },
    })
}

async fn mount_likes(server: &MockServer) {
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .and(query_param("offset", "0"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &uri,
            "me/tracks",
            vec![
                saved("t3", "2022-03-01T10:00:00Z"),
                json!({ "added_at": "2022-02-15T10:00:00Z", "track": null }),
            ],
            0,
            Some(2),
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &uri,
            "me/tracks",
            vec![
                saved("t2", "2022-02-01T10:00:00Z"),
                saved("t1", "2022-01-01T10:00:00Z"),
            ],
            2,
            None,
        )))
        .mount(server)
        .await;
}

async fn mount_playlist(server: &MockServer) {
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "me" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/playlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &uri,
            "me/playlists",
            vec![playlist_object("pl-1", "Liked playlist", "me")],
            0,
            None,
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/playlists/pl-1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &uri,
            "playlists/pl-1/tracks",
            vec![
                saved("t2", "2022-06-02T10:00:00Z"),
                saved("t1", "2022-06-01T10:00:00Z"),
            ],
            0,
            None,
        )))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn liked_tracks_follow_next_url_and_skip_null_tracks() {
    let server = MockServer::start().await;
    mount_likes(&server).await;

    let uri = server.uri();
    let ids = blocking(move || {
        let library = library_for(uri);
        let first = library
            .liked_tracks(PageRequest::first_page(2))
            .expect("first page");
        let ids: Vec<String> = paginate(first, |cursor| library.next_liked_page(cursor))
            .map(|like| like.expect("like").track_id.0)
            .collect();
        ids
    })
    .await;

    assert_eq!(ids, vec!["t3", "t2", "t1"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn http_statuses_map_to_library_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/playlists/missing/tracks"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/playlists"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/me/tracks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (user, playlist, playlists, unlike) = blocking(move || {
        let library = library_for(uri);
        (
            library.current_user_id().expect_err("401"),
            library
                .playlist_entries(&PlaylistId::new("missing"), PageRequest::first_page(10))
                .expect_err("404"),
            library
                .list_playlists(PageRequest::first_page(10))
                .expect_err("429"),
            library
                .unlike_tracks(&[TrackId::new("x")])
                .expect_err("500"),
        )
    })
    .await;

    assert_eq!(
        user,
        LibraryError::Authentication {
            message: "token expired".into()
        }
    );
    assert!(matches!(playlist, LibraryError::NotFound { .. }));
    assert_eq!(
        playlists,
        LibraryError::RateLimited {
            retry_after_secs: Some(7)
        }
    );
    match unlike {
        LibraryError::Other { message } => assert!(message.contains("500"), "{message}"),
        other => panic!("expected Other, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_a_network_error() {
    let err = blocking(|| {
        library_for("http://127.0.0.1:9/".into())
            .current_user_id()
            .expect_err("connection refused")
    })
    .await;
    assert!(matches!(err, LibraryError::Network { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn mutations_send_spotify_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/playlists/pl/tracks"))
        .and(body_json(json!({
            "uris": ["spotify:track:a", "spotify:track:b"],
            "position": 0,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "snapshot_id": "s1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/playlists/pl/tracks"))
        .and(body_json(json!({ "tracks": [{ "uri": "spotify:track:c" }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "snapshot_id": "s2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/me/tracks"))
        .and(body_json(json!({ "ids": ["d", "e"] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/playlists/old/followers"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/me/playlists"))
        .and(body_json(json!({
            "name": "Liked playlist",
            "description": "All my likes",
            "public": false,
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({
                "id": "new-pl",
                "name": "Liked playlist",
                "owner": { "id": "me" },
                "description": "All my likes",
                "tracks": { "total": 0 },
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let created = blocking(move || {
        let library = library_for(uri);
        let pl = PlaylistId::new("pl");
        library
            .add_to_playlist(&pl, &[TrackId::new("a"), TrackId::new("b")], true)
            .expect("add");
        library
            .remove_from_playlist(&pl, &[TrackId::new("c")])
            .expect("remove");
        library
            .unlike_tracks(&[TrackId::new("d"), TrackId::new("e")])
            .expect("unlike");
        library
            .unfollow_playlist(&PlaylistId::new("old"))
            .expect("unfollow");
        library
            .create_playlist("me", "Liked playlist", "All my likes")
            .expect("create")
    })
    .await;

    assert_eq!(created.id, PlaylistId::new("new-pl"));
    assert_eq!(created.owner_id, "me");
    assert_eq!(created.description.as_deref(), Some("All my likes"));
}

#[tokio::test(flavor = "multi_thread")]
async fn spotify_library_contract() {
    let server = MockServer::start().await;
    mount_likes(&server).await;
    mount_playlist(&server).await;

    let uri = server.uri();
    let result = blocking(move || {
        let library = library_for(uri);
        run_library_contract(
            &library,
            &LibraryContractExpectations {
                library_id: "spotify".into(),
                page_size: 2,
                min_liked: 3,
                playlist: Some(PlaylistId::new("pl-1")),
            },
        )
    })
    .await;

    assert!(result.is_ok(), "contract failed: {result:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn fast_sync_pushes_new_likes_to_playlist_head() {
    let server = MockServer::start().await;
    mount_likes(&server).await;
    mount_playlist(&server).await;
    Mock::given(method("POST"))
        .and(path("/playlists/pl-1/tracks"))
        .and(body_json(json!({ "uris": ["spotify:track:t3"], "position": 0 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "snapshot_id": "s" })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let report = blocking(move || {
        let library = library_for(uri);
        let settings = SyncSettings {
            page_size: 2,
            ..SyncSettings::default()
        };
        let mut run = SyncRun::new(&library, settings);
        let report = run
            .sync_liked_with_playlist("Liked playlist", SyncMode::Fast, false)
            .expect("sync");
        report
    })
    .await;

    assert_eq!(report.merge.to_add, vec![TrackId::new("t3")]);
    assert_eq!(report.to_string(), "Added 1 songs");
}

/// Matches a request whose `ids` array holds exactly this many ids.
struct UnlikeIdCount(usize);

impl Match for UnlikeIdCount {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .ok()
            .and_then(|body| body["ids"].as_array().map(Vec::len))
            == Some(self.0)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_unlikes_respect_spotify_limit() {
    let server = MockServer::start().await;
    let newer = (0..60).map(|i| {
        json!({
            "added_at": format!("2023-02-01T00:00:{i:02}Z"),
            "track": { "id": format!("new{i}"), "name": format!("Song {i}"), "duration_ms": 180000 },
        })
    });
    let older = (0..60).map(|i| {
        json!({
            "added_at": format!("2023-01-01T00:00:{i:02}Z"),
            "track": { "id": format!("old{i}"), "name": format!("Song {i}"), "duration_ms": 180000 },
        })
    });
    let items: Vec<Value> = newer.chain(older).collect();
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": format!("{}/me/tracks?offset=0&limit=50", server.uri()),
            "items": items,
            "limit": 50,
            "next": null,
            "offset": 0,
            "total": 120,
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/me/tracks"))
        .and(UnlikeIdCount(50))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/me/tracks"))
        .and(UnlikeIdCount(10))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let (unliked, applied) = blocking(move || {
        let library = library_for(uri);
        let mut run = SyncRun::new(&library, SyncSettings::default());
        let report = run.remove_liked_duplicates(false).expect("dedupe");
        (report.unliked, run.applied_chunks())
    })
    .await;

    assert_eq!(unliked, 60);
    assert_eq!(applied, 2);
}
