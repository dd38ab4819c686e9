//! Atomic installation of toolchain trees
//!
//! [`ArchiveInstaller::install_from`] stages the new tree next to its final
//! location (`<destination>.tmp`), and only once staging has fully succeeded
//! replaces the destination with the staged payload directory. A failure at
//! any point removes the staging directory and leaves the destination as it
//! was.
//!
//! - [`tarball`]: `.tar.gz` / `.tgz` extraction
//! - [`zipfile`]: `.zip` extraction

pub mod tarball;
pub mod zipfile;

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory every Go archive and source checkout unpacks into
pub const DEFAULT_PAYLOAD_DIR: &str = "go";

const STAGING_SUFFIX: &str = ".tmp";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Archive entry {0:?} is not a safe relative path")]
    UnsafePath(String),

    #[error("Archive entry {name:?} has unsupported type {kind}")]
    UnsupportedEntry { name: String, kind: String },

    #[error("Only wrote {actual} bytes to {path:?}; expected {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Don't know how to extract {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("{source_path:?} does not contain a {payload:?} directory")]
    MissingPayload { source_path: PathBuf, payload: String },

    #[error("{source_path:?} is incomplete: {entry_point:?} is missing")]
    MissingEntryPoint {
        source_path: PathBuf,
        entry_point: PathBuf,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub(crate) fn io_error(path: &Path) -> impl Fn(std::io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Installs extracted toolchain trees into their final location
#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    payload_dir: String,
    entry_point: Option<PathBuf>,
}

impl Default for ArchiveInstaller {
    fn default() -> Self {
        Self::new(DEFAULT_PAYLOAD_DIR)
    }
}

impl ArchiveInstaller {
    /// `payload_dir` is the directory inside the archive that becomes the
    /// installation root
    pub fn new(payload_dir: &str) -> Self {
        Self {
            payload_dir: payload_dir.to_string(),
            entry_point: None,
        }
    }

    /// Refuses to install a payload without `entry_point` (relative to the
    /// payload directory), leaving the destination untouched
    pub fn require_entry_point(mut self, entry_point: impl Into<PathBuf>) -> Self {
        self.entry_point = Some(entry_point.into());
        self
    }

    /// Installs `source` at `destination` and returns `destination`
    ///
    /// `source` is either an archive (`.tar.gz`, `.tgz`, `.zip`) whose payload
    /// directory becomes the installation, or an already extracted payload
    /// directory (a source build), which is moved.
    pub fn install_from(&self, source: &Path, destination: &Path) -> Result<PathBuf, ArchiveError> {
        let staging = staging_path(destination);
        info!("Installing {:?} to {:?}", source, destination);

        if staging.exists() {
            debug!("Removing leftover staging directory {:?}", staging);
            fs::remove_dir_all(&staging).map_err(io_error(&staging))?;
        }
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::create_dir(&staging).map_err(io_error(&staging))?;

        let result = self.stage_and_commit(source, &staging, destination);

        if staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!("Failed to remove staging directory {:?}: {}", staging, e);
            }
        }

        result.map(|_| destination.to_path_buf())
    }

    fn stage_and_commit(
        &self,
        source: &Path,
        staging: &Path,
        destination: &Path,
    ) -> Result<(), ArchiveError> {
        let payload = staging.join(&self.payload_dir);

        if source.is_dir() {
            rename_or_copy(source, &payload)?;
        } else {
            extract(source, staging)?;
        }

        if !payload.is_dir() {
            return Err(ArchiveError::MissingPayload {
                source_path: source.to_path_buf(),
                payload: self.payload_dir.clone(),
            });
        }
        if let Some(entry_point) = &self.entry_point {
            if !payload.join(entry_point).is_file() {
                return Err(ArchiveError::MissingEntryPoint {
                    source_path: source.to_path_buf(),
                    entry_point: entry_point.clone(),
                });
            }
        }

        if destination.exists() {
            info!("Replacing existing installation at {:?}", destination);
            fs::remove_dir_all(destination).map_err(io_error(destination))?;
        }

        rename_or_copy(&payload, destination)
    }
}

/// `<destination>.tmp`, a sibling of the destination
pub fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(STAGING_SUFFIX);
    destination.with_file_name(name)
}

/// Extracts an archive into `dir`, choosing the format by file suffix
pub fn extract(archive: &Path, dir: &Path) -> Result<(), ArchiveError> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        tarball::extract_tar_gz(archive, dir)
    } else if name.ends_with(".zip") {
        zipfile::extract_zip(archive, dir)
    } else {
        Err(ArchiveError::UnsupportedFormat(archive.to_path_buf()))
    }
}

/// Validates an archive entry name and converts it to a relative path
///
/// Names must be non-empty, `/`-separated, relative, and free of `..`
/// segments. Backslashes and drive prefixes are rejected outright.
pub fn validate_entry_name(name: &str) -> Result<PathBuf, ArchiveError> {
    let unsafe_path = || ArchiveError::UnsafePath(name.to_string());

    if name.is_empty() || name.contains('\\') || name.starts_with('/') {
        return Err(unsafe_path());
    }
    if name.split('/').any(|segment| segment == "..") {
        return Err(unsafe_path());
    }

    let relative: PathBuf = name
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(unsafe_path());
    }
    Ok(relative)
}

/// Moves `src` to `dest`, falling back to a recursive copy followed by
/// deleting `src` when a rename is not possible (e.g. across filesystems)
pub fn rename_or_copy(src: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let Err(e) = fs::rename(src, dest) else {
        return Ok(());
    };
    debug!(
        "Rename {:?} -> {:?} failed ({}), falling back to copy",
        src, dest, e
    );

    if let Err(e) = copy_tree(src, dest) {
        if dest.exists() {
            let _ = fs::remove_dir_all(dest);
        }
        return Err(e);
    }

    if let Err(e) = fs::remove_dir_all(src) {
        warn!("Failed to delete {:?} after copying it: {}", src, e);
    }
    Ok(())
}

fn copy_tree(src: &Path, dest: &Path) -> Result<(), ArchiveError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| ArchiveError::Io {
            path: e.path().unwrap_or(src).to_path_buf(),
            source: e.into(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| ArchiveError::UnsafePath(entry.path().display().to_string()))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(io_error(&target))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> Result<(), ArchiveError> {
    let link = fs::read_link(src).map_err(io_error(src))?;
    std::os::unix::fs::symlink(link, target).map_err(io_error(target))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> Result<(), ArchiveError> {
    fs::copy(src, target).map_err(io_error(target))?;
    Ok(())
}
