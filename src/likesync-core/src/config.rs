use crate::paths::AppDirs;
use crate::reconcile::ReconcileOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;
/// Largest batch the Spotify mutation endpoints accept.
const MAX_CHUNK_SIZE: usize = 100;
const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            spotify: SpotifyConfig::default(),
            sync: SyncSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Bearer token; the CLI flag or `LIKESYNC_ACCESS_TOKEN` take precedence.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            access_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,
    #[serde(default = "default_true")]
    pub check_ordering: bool,
    #[serde(default = "default_true")]
    pub fallback_to_full: bool,
    #[serde(default = "default_true")]
    pub prune_duplicate_playlists: bool,
    #[serde(default = "default_true")]
    pub remove_duplicates: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            playlist_name: default_playlist_name(),
            chunk_size: default_chunk_size(),
            page_size: default_page_size(),
            loop_window: default_loop_window(),
            check_ordering: true,
            fallback_to_full: true,
            prune_duplicate_playlists: true,
            remove_duplicates: true,
        }
    }
}

impl SyncSettings {
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            check_ordering: self.check_ordering,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_stdout_enabled")]
    pub stdout: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stdout: default_stdout_enabled(),
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("sync.chunk_size must be between 1 and {max}, got {found}")]
    ChunkSize { found: usize, max: usize },
    #[error("sync.page_size must be between 1 and {max}, got {found}")]
    PageSize { found: u32, max: u32 },
    #[error("sync.loop_window must be at least 1")]
    LoopWindow,
    #[error("sync.playlist_name must not be empty")]
    EmptyPlaylistName,
    #[error("spotify.request_timeout_secs must be at least 1")]
    RequestTimeout,
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        let path = Self::config_path(dirs);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_file()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        let sync = &self.sync;
        if sync.chunk_size == 0 || sync.chunk_size > MAX_CHUNK_SIZE {
            return Err(ValidationError::ChunkSize {
                found: sync.chunk_size,
                max: MAX_CHUNK_SIZE,
            });
        }
        if sync.page_size == 0 || sync.page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::PageSize {
                found: sync.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        if sync.loop_window == 0 {
            return Err(ValidationError::LoopWindow);
        }
        if sync.playlist_name.trim().is_empty() {
            return Err(ValidationError::EmptyPlaylistName);
        }
        if self.spotify.request_timeout_secs == 0 {
            return Err(ValidationError::RequestTimeout);
        }
        Ok(())
    }
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_api_base_url() -> String {
    "https://api.spotify.com/v1/".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_playlist_name() -> String {
    "Liked playlist".to_string()
}

fn default_chunk_size() -> usize {
    MAX_CHUNK_SIZE
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_loop_window() -> usize {
    crate::paging::DEFAULT_LOOP_WINDOW
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_stdout_enabled() -> bool {
    true
}
