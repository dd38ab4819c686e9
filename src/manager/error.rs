use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::download::DownloadError;
use crate::source::{BuildError, SourceError};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("No binary release of go{version} for {os}/{arch}")]
    BinaryNotFound {
        version: String,
        os: String,
        arch: String,
    },

    #[error("Version {0} is not installed")]
    NotInstalled(String),

    #[error("Path {0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Unknown version {0}")]
    UnknownVersion(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ManagerError {
    /// Whether the binary catalog has nothing for the requested version, the
    /// one failure that falls back to a source install
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ManagerError::BinaryNotFound { .. }
                | ManagerError::Download(DownloadError::NotFound(_))
        )
    }
}
