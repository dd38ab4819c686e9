//! gzip-compressed tar extraction
//!
//! Every entry name is validated before anything is written; an unsafe name
//! or an unsupported entry type aborts the whole extraction. Only regular
//! files and directories are materialized. Global pax headers, which
//! `git archive` emits, are skipped.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use tar::EntryType;
use tracing::debug;

use crate::archive::{ArchiveError, io_error, validate_entry_name};

/// Extracts the `.tar.gz` at `archive` into `dir`
pub fn extract_tar_gz(archive: &Path, dir: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive).map_err(io_error(archive))?;
    unpack(GzDecoder::new(BufReader::new(file)), dir)
}

/// Extracts a tar stream into `dir`
pub fn unpack<R: Read>(reader: R, dir: &Path) -> Result<(), ArchiveError> {
    let started = SystemTime::now();
    let mut archive = tar::Archive::new(reader);
    let mut made_dirs: HashSet<PathBuf> = HashSet::new();
    let mut count = 0usize;

    for entry in archive.entries().map_err(io_error(dir))? {
        let mut entry = entry.map_err(io_error(dir))?;

        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let relative = validate_entry_name(&name)?;
        let target = dir.join(&relative);

        let header = entry.header();
        let entry_type = header.entry_type();
        let mode = header.mode().map_err(io_error(&target))?;
        let size = header.size().map_err(io_error(&target))?;
        let mtime = header.mtime().ok();

        match entry_type {
            EntryType::Regular | EntryType::Continuous => {
                if relative.as_os_str().is_empty() {
                    return Err(ArchiveError::UnsafePath(name));
                }
                if let Some(parent) = target.parent() {
                    if made_dirs.insert(parent.to_path_buf()) {
                        fs::create_dir_all(parent).map_err(io_error(parent))?;
                    }
                }
                write_file(&mut entry, &target, mode, size, mtime, started)?;
            }
            EntryType::Directory => {
                fs::create_dir_all(&target).map_err(io_error(&target))?;
                set_mode(&target, mode)?;
                made_dirs.insert(target);
            }
            EntryType::XGlobalHeader => continue,
            other => {
                return Err(ArchiveError::UnsupportedEntry {
                    name,
                    kind: format!("{:?}", other),
                });
            }
        }
        count += 1;
    }

    debug!("Extracted {} entries into {:?}", count, dir);
    Ok(())
}

fn write_file<R: Read>(
    entry: &mut R,
    target: &Path,
    mode: u32,
    size: u64,
    mtime: Option<u64>,
    started: SystemTime,
) -> Result<(), ArchiveError> {
    unlink_executable(target, mode)?;

    let mut file = File::create(target).map_err(io_error(target))?;
    let written = std::io::copy(entry, &mut file).map_err(io_error(target))?;
    if written != size {
        return Err(ArchiveError::SizeMismatch {
            path: target.to_path_buf(),
            expected: size,
            actual: written,
        });
    }

    set_file_mode(&file, target, mode)?;

    // future timestamps are clamped so build caches don't see files from
    // the future
    if let Some(secs) = mtime.filter(|secs| *secs > 0) {
        let modified = (UNIX_EPOCH + Duration::from_secs(secs)).min(started);
        if let Err(e) = file.set_modified(modified) {
            debug!("Failed to set mtime on {:?}: {}", target, e);
        }
    }
    Ok(())
}

/// The darwin kernel caches code signatures per inode, so an executable is
/// unlinked rather than truncated in place.
#[cfg(target_os = "macos")]
fn unlink_executable(target: &Path, mode: u32) -> Result<(), ArchiveError> {
    if mode & 0o111 == 0 {
        return Ok(());
    }
    match fs::remove_file(target) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(ArchiveError::Io {
            path: target.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}

#[cfg(not(target_os = "macos"))]
fn unlink_executable(_target: &Path, _mode: u32) -> Result<(), ArchiveError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(file: &File, target: &Path, mode: u32) -> Result<(), ArchiveError> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
        .map_err(io_error(target))
}

#[cfg(not(unix))]
fn set_file_mode(_file: &File, _target: &Path, _mode: u32) -> Result<(), ArchiveError> {
    Ok(())
}

#[cfg(unix)]
fn set_mode(target: &Path, mode: u32) -> Result<(), ArchiveError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o7777))
        .map_err(io_error(target))
}

#[cfg(not(unix))]
fn set_mode(_target: &Path, _mode: u32) -> Result<(), ArchiveError> {
    Ok(())
}
