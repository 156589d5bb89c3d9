//! Bounded-size batching for library mutations.
//!
//! Mutation endpoints accept a limited number of ids per call. Chunks are
//! planned from the tail of the list toward the head so that repeatedly
//! inserting each chunk at position 0 leaves the list in its original order.

use crate::library::LibraryError;
use thiserror::Error;

/// Split `items` into chunks of at most `size`, latest chunk first.
///
/// Each chunk keeps the internal order of `items`, and concatenating the
/// chunks in reverse yields `items` again. An empty list plans no chunks.
/// A zero `size` is treated as one.
///
/// ```
/// use likesync_core::chunks::plan_chunks;
///
/// let items = [1, 2, 3, 4, 5, 6, 7, 8];
/// let chunks: Vec<&[i32]> = plan_chunks(&items, 3).collect();
/// assert_eq!(chunks, vec![&[6, 7, 8][..], &[3, 4, 5][..], &[1, 2][..]]);
/// ```
pub fn plan_chunks<T>(items: &[T], size: usize) -> std::slice::RChunks<'_, T> {
    items.rchunks(size.max(1))
}

/// Which remote mutation a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOperation {
    AddToPlaylist,
    RemoveFromPlaylist,
    Unlike,
}

impl ChunkOperation {
    pub const ALL: [ChunkOperation; 3] = [
        ChunkOperation::AddToPlaylist,
        ChunkOperation::RemoveFromPlaylist,
        ChunkOperation::Unlike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkOperation::AddToPlaylist => "add to playlist",
            ChunkOperation::RemoveFromPlaylist => "remove from playlist",
            ChunkOperation::Unlike => "unlike",
        }
    }
}

/// A chunk call failed part-way through a batch run.
#[derive(Debug, Error)]
#[error("{} failed after {applied} of {total} chunks: {source}", .operation.as_str())]
pub struct ChunkApplyError {
    pub operation: ChunkOperation,
    pub applied: usize,
    pub total: usize,
    #[source]
    pub source: LibraryError,
}

/// Apply `apply` to every planned chunk, stopping at the first failure.
///
/// Returns the number of chunks applied. Nothing is retried: a failed chunk
/// may have been partially applied remotely, so the error reports how many
/// chunks had already succeeded.
pub fn apply_in_chunks<T, F>(
    operation: ChunkOperation,
    items: &[T],
    size: usize,
    mut apply: F,
) -> Result<usize, ChunkApplyError>
where
    F: FnMut(&[T]) -> Result<(), LibraryError>,
{
    let chunks = plan_chunks(items, size);
    let total = chunks.len();
    let mut applied = 0;
    for chunk in chunks {
        tracing::debug!(
            "{}: chunk {}/{} with {} ids",
            operation.as_str(),
            applied + 1,
            total,
            chunk.len()
        );
        apply(chunk).map_err(|source| ChunkApplyError {
            operation,
            applied,
            total,
            source,
        })?;
        applied += 1;
    }
    Ok(applied)
}
