use crate::{APP_AUTHOR, APP_NAME, APP_QUALIFIER};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = "config.toml";

/// Where likesync keeps its config file and rotated logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl AppDirs {
    /// Platform locations, e.g. `~/.config/likesync` on Linux.
    pub fn discover() -> Result<Self, DirsError> {
        let project = ProjectDirs::from(APP_QUALIFIER, APP_AUTHOR, APP_NAME)
            .ok_or(DirsError::NoHomeDirectory)?;
        Ok(Self::from_parts(project.config_dir(), project.data_local_dir()))
    }

    /// Lay every directory out under a single root.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::from_parts(&root.join("config"), &root.join("data"))
    }

    fn from_parts(config_dir: &Path, data_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            data_dir: data_dir.to_path_buf(),
            log_dir: data_dir.join("logs"),
        }
    }

    pub fn ensure_exists(&self) -> Result<(), DirsError> {
        [&self.config_dir, &self.data_dir, &self.log_dir]
            .into_iter()
            .try_for_each(|dir| {
                std::fs::create_dir_all(dir).map_err(|source| DirsError::Create {
                    path: dir.clone(),
                    source,
                })
            })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

#[derive(Debug, Error)]
pub enum DirsError {
    #[error("no home directory to place likesync config and logs in")]
    NoHomeDirectory,
    #[error("failed to create directory {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
}
