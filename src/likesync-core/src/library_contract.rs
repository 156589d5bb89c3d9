use crate::chunks::ChunkOperation;
use crate::library::Library;
use crate::models::{Entry, PageRequest, PlaylistId};
use crate::paging::paginate;
use thiserror::Error;

/// Expectations supplied by a library implementation to run the shared contract suite.
#[derive(Debug, Clone)]
pub struct LibraryContractExpectations {
    /// The id the library reports for itself.
    pub library_id: String,
    /// Page size requested for every listing; forces multi-page walks on small fixtures.
    pub page_size: u32,
    /// Lower bound on the liked songs the fixture holds.
    pub min_liked: usize,
    /// A playlist owned by the current user whose entries are listed.
    pub playlist: Option<PlaylistId>,
}

/// Errors surfaced by the library contract test harness.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LibraryContractError {
    #[error("library id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },
    #[error("library reports a zero max batch size for {}", .0.as_str())]
    ZeroBatchSize(ChunkOperation),
    #[error("current user id is empty")]
    EmptyUserId,
    #[error("{listing} page holds {actual} items but {limit} were requested")]
    OversizedPage {
        listing: &'static str,
        limit: u32,
        actual: usize,
    },
    #[error("{listing} entry {position} has an empty track id")]
    EmptyTrackId {
        listing: &'static str,
        position: usize,
    },
    #[error("{listing} entry {position} is newer than the one before it")]
    NotNewestFirst {
        listing: &'static str,
        position: usize,
    },
    #[error("expected at least {expected} liked songs, listed {actual}")]
    TooFewLikes { expected: usize, actual: usize },
    #[error("playlist {expected} is missing from the user's playlists")]
    PlaylistMissing { expected: PlaylistId },
    #[error("pagination failed while running contract: {0}")]
    Paging(String),
    #[error("library error while running contract: {0}")]
    LibraryFailure(String),
}

/// Run the shared library contract suite against a library implementation.
///
/// Implementations should call this from their crate-level tests with fixtures
/// that exist in their test setup.
pub fn run_library_contract<L: Library + ?Sized>(
    library: &L,
    expectations: &LibraryContractExpectations,
) -> Result<(), LibraryContractError> {
    verify_identity(library, expectations)?;
    verify_likes(library, expectations)?;
    if let Some(playlist_id) = &expectations.playlist {
        verify_playlist(library, expectations, playlist_id)?;
    }
    Ok(())
}

fn verify_identity<L: Library + ?Sized>(
    library: &L,
    expectations: &LibraryContractExpectations,
) -> Result<(), LibraryContractError> {
    if library.id() != expectations.library_id {
        return Err(LibraryContractError::IdMismatch {
            expected: expectations.library_id.clone(),
            actual: library.id().to_string(),
        });
    }
    if let Some(operation) = ChunkOperation::ALL
        .into_iter()
        .find(|op| library.max_batch_size(*op) == 0)
    {
        return Err(LibraryContractError::ZeroBatchSize(operation));
    }
    let user = library
        .current_user_id()
        .map_err(|e| LibraryContractError::LibraryFailure(e.to_string()))?;
    if user.trim().is_empty() {
        return Err(LibraryContractError::EmptyUserId);
    }
    Ok(())
}

fn verify_likes<L: Library + ?Sized>(
    library: &L,
    expectations: &LibraryContractExpectations,
) -> Result<(), LibraryContractError> {
    let first = library
        .liked_tracks(PageRequest::first_page(expectations.page_size))
        .map_err(|e| LibraryContractError::LibraryFailure(e.to_string()))?;
    check_page_size("liked songs", expectations.page_size, first.items.len())?;

    let likes = paginate(first, |cursor| library.next_liked_page(cursor))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LibraryContractError::Paging(e.to_string()))?;
    check_entries("liked songs", &likes)?;

    if likes.len() < expectations.min_liked {
        return Err(LibraryContractError::TooFewLikes {
            expected: expectations.min_liked,
            actual: likes.len(),
        });
    }
    Ok(())
}

fn verify_playlist<L: Library + ?Sized>(
    library: &L,
    expectations: &LibraryContractExpectations,
    playlist_id: &PlaylistId,
) -> Result<(), LibraryContractError> {
    let listed = library
        .list_playlists(PageRequest::first_page(expectations.page_size))
        .map_err(|e| LibraryContractError::LibraryFailure(e.to_string()))?;
    let playlists = paginate(listed, |cursor| library.next_playlists_page(cursor))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LibraryContractError::Paging(e.to_string()))?;
    if !playlists.iter().any(|p| &p.id == playlist_id) {
        return Err(LibraryContractError::PlaylistMissing {
            expected: playlist_id.clone(),
        });
    }

    let first = library
        .playlist_entries(playlist_id, PageRequest::first_page(expectations.page_size))
        .map_err(|e| LibraryContractError::LibraryFailure(e.to_string()))?;
    check_page_size("playlist", expectations.page_size, first.items.len())?;
    let entries = paginate(first, |cursor| library.next_playlist_page(cursor))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LibraryContractError::Paging(e.to_string()))?;
    check_entries("playlist", &entries)
}

fn check_page_size(
    listing: &'static str,
    limit: u32,
    actual: usize,
) -> Result<(), LibraryContractError> {
    if actual > limit as usize {
        return Err(LibraryContractError::OversizedPage {
            listing,
            limit,
            actual,
        });
    }
    Ok(())
}

fn check_entries<E: Entry>(listing: &'static str, entries: &[E]) -> Result<(), LibraryContractError> {
    for (position, entry) in entries.iter().enumerate() {
        if entry.track_id().as_ref().trim().is_empty() {
            return Err(LibraryContractError::EmptyTrackId { listing, position });
        }
    }
    if let Some(position) = entries
        .windows(2)
        .position(|pair| pair[1].added_at() > pair[0].added_at())
    {
        return Err(LibraryContractError::NotNewestFirst {
            listing,
            position: position + 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_timestamp;
    use crate::memory::MemoryLibrary;
    use crate::models::{LikedEntry, Playlist, PlaylistEntry, TrackId};

    fn like(id: &str, added_at: &str) -> LikedEntry {
        LikedEntry {
            track_id: TrackId::new(id),
            track_name: format!("Song {id}"),
            duration_ms: 210_000,
            added_at: parse_timestamp(added_at).expect("timestamp"),
        }
    }

    fn fixture_likes() -> Vec<LikedEntry> {
        vec![
            like("t5", "2023-05-01"),
            like("t4", "2023-04-01"),
            like("t3", "2023-03-01"),
            like("t2", "2023-02-01"),
            like("t1", "2023-01-01"),
        ]
    }

    fn fixture_playlist() -> (Playlist, Vec<PlaylistEntry>) {
        let playlist = Playlist {
            id: PlaylistId::new("pl-1"),
            name: "Liked playlist".into(),
            owner_id: "user-1".into(),
            description: None,
            track_count: None,
        };
        let entries = ["t4", "t3", "t1"]
            .iter()
            .enumerate()
            .map(|(i, id)| PlaylistEntry {
                track_id: TrackId::new(*id),
                track_name: format!("Song {id}"),
                added_at: parse_timestamp(&format!("2023-06-{:02}", 20 - i)).expect("timestamp"),
            })
            .collect();
        (playlist, entries)
    }

    fn expectations() -> LibraryContractExpectations {
        LibraryContractExpectations {
            library_id: "memory".into(),
            page_size: 2,
            min_liked: 5,
            playlist: Some(PlaylistId::new("pl-1")),
        }
    }

    #[test]
    fn contract_passes_for_memory_library() {
        let (playlist, entries) = fixture_playlist();
        let library = MemoryLibrary::new("user-1")
            .with_likes(fixture_likes())
            .with_playlist(playlist, entries);

        let result = run_library_contract(&library, &expectations());
        assert!(result.is_ok(), "expected contract to pass: {result:?}");
    }

    #[test]
    fn contract_rejects_unordered_likes() {
        let mut likes = fixture_likes();
        likes.swap(1, 2);
        let (playlist, entries) = fixture_playlist();
        let library = MemoryLibrary::new("user-1")
            .with_likes(likes)
            .with_playlist(playlist, entries);

        assert_eq!(
            run_library_contract(&library, &expectations()),
            Err(LibraryContractError::NotNewestFirst {
                listing: "liked songs",
                position: 2,
            })
        );
    }

    #[test]
    fn contract_reports_pagination_loops() {
        let library = MemoryLibrary::new("user-1")
            .with_likes(fixture_likes())
            .with_stuck_cursor();
        let mut expectations = expectations();
        expectations.playlist = None;

        assert!(matches!(
            run_library_contract(&library, &expectations),
            Err(LibraryContractError::Paging(_))
        ));
    }

    #[test]
    fn contract_requires_listed_playlist() {
        let library = MemoryLibrary::new("user-1").with_likes(fixture_likes());
        assert_eq!(
            run_library_contract(&library, &expectations()),
            Err(LibraryContractError::PlaylistMissing {
                expected: PlaylistId::new("pl-1"),
            })
        );
    }

    #[test]
    fn contract_rejects_zero_batch_size() {
        let library = MemoryLibrary::new("user-1")
            .with_likes(fixture_likes())
            .with_max_batch_size(0);
        assert_eq!(
            run_library_contract(&library, &expectations()),
            Err(LibraryContractError::ZeroBatchSize(
                ChunkOperation::AddToPlaylist
            ))
        );
    }
}
