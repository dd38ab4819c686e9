use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessError;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Git error: {0}")]
    Git(#[from] ProcessError),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid cache metadata in {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid commit timestamp: {0:?}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("GOROOT_BOOTSTRAP or GOROOT must point to a Go installation to build from source")]
    MissingBootstrap,

    #[error("Bootstrap toolchain {0:?} is not a directory")]
    BootstrapNotFound(PathBuf),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Build failed: {0}")]
    Process(#[from] ProcessError),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
