pub mod chunks;
pub mod config;
pub mod dates;
pub mod duplicates;
pub mod library;
pub mod library_contract;
pub mod logging;
pub mod memory;
pub mod models;
pub mod paging;
pub mod paths;
pub mod reconcile;
pub mod sync;

pub use chunks::{apply_in_chunks, plan_chunks, ChunkApplyError, ChunkOperation};
pub use config::{
    Config, ConfigError, LogLevel, LoggingConfig, SpotifyConfig, SyncSettings, ValidationError,
};
pub use dates::{parse_timestamp, DateParseError};
pub use duplicates::{find_duplicates, DuplicateGroup, DuplicatePlan};
pub use library::{Library, LibraryError, LibraryResult};
pub use library_contract::{
    run_library_contract, LibraryContractError, LibraryContractExpectations,
};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use memory::{LibraryCall, MemoryLibrary};
pub use models::{
    Entry, LikedEntry, Page, PageCursor, PageMeta, PageRequest, Playlist, PlaylistEntry,
    PlaylistId, TrackId,
};
pub use paging::{paginate, PagedSequence, PaginationLoopError, PagingError};
pub use paths::{AppDirs, DirsError};
pub use reconcile::{
    merge_fast, merge_full, reconcile, MergeResult, OrderingViolation, ReconcileError,
    ReconcileOptions, StreamKind, SyncMode,
};
pub use sync::{DuplicateReport, SyncError, SyncReport, SyncRun};

pub const APP_NAME: &str = "likesync";
pub const APP_AUTHOR: &str = "Likesync";
pub const APP_QUALIFIER: &str = "io";
