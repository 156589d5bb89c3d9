//! Process-wide tracing setup for the `likesync` binary.

use crate::config::{LogLevel, LoggingConfig};
use crate::paths::AppDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILE: &str = "likesync.log";

/// Flushes the file writer on drop; hold it until the process exits.
pub struct LoggingGuard {
    _worker: WorkerGuard,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to prune old log files in {path}: {source}")]
    Prune {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level so a single run can be traced
/// without editing the config file.
pub fn init_logging(config: &LoggingConfig, dirs: &AppDirs) -> Result<LoggingGuard, LoggingError> {
    let log_dir = dirs.log_dir().to_path_buf();
    fs::create_dir_all(&log_dir).map_err(|source| LoggingError::LogDir {
        path: log_dir.clone(),
        source,
    })?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(config.level)?,
    };
    let (file, worker, pruned) = rolling_writer(config, &log_dir)?;
    let writer = if config.stdout {
        BoxMakeWriter::new(std::io::stdout.and(file))
    } else {
        BoxMakeWriter::new(file)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.stdout)
        .with_writer(writer)
        .try_init()
        .map_err(LoggingError::AlreadyInstalled)?;
    if pruned > 0 {
        tracing::debug!("Removed {pruned} old log files from {}", log_dir.display());
    }

    Ok(LoggingGuard {
        _worker: worker,
        log_dir,
    })
}

fn level_filter(level: LogLevel) -> Result<EnvFilter, LoggingError> {
    let directive = level.as_filter_directive();
    EnvFilter::try_new(directive).map_err(|source| LoggingError::Filter {
        directive: directive.to_string(),
        source,
    })
}

/// Daily rolling writer, plus how many stale rotations were pruned.
fn rolling_writer(
    config: &LoggingConfig,
    log_dir: &Path,
) -> Result<(NonBlocking, WorkerGuard, usize), LoggingError> {
    let file_name = config.file_name.as_deref().unwrap_or(DEFAULT_LOG_FILE);
    let pruned = prune_rotated_logs(log_dir, file_name, config.max_log_files.max(1))?;
    let appender = tracing_appender::rolling::daily(log_dir, file_name);
    let (writer, worker) = tracing_appender::non_blocking(appender);
    Ok((writer, worker, pruned))
}

/// Rotated files for `file_name`, oldest first.
fn rotated_logs(dir: &Path, file_name: &str) -> Result<Vec<(SystemTime, PathBuf)>, LoggingError> {
    let entries = fs::read_dir(dir).map_err(|source| LoggingError::Prune {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut logs: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(file_name))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.path()))
        })
        .collect();
    logs.sort();
    Ok(logs)
}

/// Delete the oldest rotated files so at most `keep` remain.
fn prune_rotated_logs(dir: &Path, file_name: &str, keep: usize) -> Result<usize, LoggingError> {
    let logs = rotated_logs(dir, file_name)?;
    let excess = logs.len().saturating_sub(keep);
    for (_, path) in logs.into_iter().take(excess) {
        fs::remove_file(&path).map_err(|source| LoggingError::Prune { path, source })?;
    }
    Ok(excess)
}
