//! `.zip` extraction

use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::archive::{ArchiveError, io_error, validate_entry_name};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Extracts the zip file at `archive` into `dir`
pub fn extract_zip(archive: &Path, dir: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive).map_err(io_error(archive))?;
    unpack(file, dir)
}

/// Extracts a zip stream into `dir`
pub fn unpack<R: Read + Seek>(reader: R, dir: &Path) -> Result<(), ArchiveError> {
    let mut archive = ZipArchive::new(reader)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        let relative = validate_entry_name(&name)?;
        // the zip crate's own containment check must agree
        if entry.enclosed_name().is_none() {
            return Err(ArchiveError::UnsafePath(name));
        }
        let target = dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
            continue;
        }
        if relative.as_os_str().is_empty() {
            return Err(ArchiveError::UnsafePath(name));
        }
        let mode = entry.unix_mode();
        if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            return Err(ArchiveError::UnsupportedEntry {
                name,
                kind: "symlink".to_string(),
            });
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut file = File::create(&target).map_err(io_error(&target))?;
        let expected = entry.size();
        let written = std::io::copy(&mut entry, &mut file).map_err(io_error(&target))?;
        if written != expected {
            return Err(ArchiveError::SizeMismatch {
                path: target,
                expected,
                actual: written,
            });
        }
        if let Some(mode) = mode {
            set_file_mode(&file, &target, mode)?;
        }
    }

    debug!("Extracted {} zip entries into {:?}", archive.len(), dir);
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

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn unpack_writes_nested_files() {
        let temp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[
            ("go/bin/go.exe", b"MZ".as_slice()),
            ("go/VERSION", b"go1.21.0".as_slice()),
        ]);

        unpack(Cursor::new(bytes), temp.path()).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("go/VERSION")).unwrap(),
            "go1.21.0"
        );
        assert!(temp.path().join("go/bin/go.exe").is_file());
    }

    #[test]
    fn unpack_creates_directory_entries() {
        let temp = TempDir::new().unwrap();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory("go/pkg/", SimpleFileOptions::default())
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        unpack(Cursor::new(bytes), temp.path()).unwrap();

        assert!(temp.path().join("go/pkg").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn unpack_applies_unix_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "go/bin/go",
                SimpleFileOptions::default().unix_permissions(0o755),
            )
            .unwrap();
        writer.write_all(b"binary").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        unpack(Cursor::new(bytes), temp.path()).unwrap();

        let mode = fs::metadata(temp.path().join("go/bin/go"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[rstest]
    #[case("../evil")]
    #[case("go/../../evil")]
    fn unpack_rejects_escaping_entries(#[case] name: &str) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir(&root).unwrap();
        let bytes = zip_bytes(&[(name, b"pwned".as_slice())]);

        let result = unpack(Cursor::new(bytes), &root);

        assert!(matches!(result, Err(ArchiveError::UnsafePath(_))));
        assert!(!temp.path().join("evil").exists());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn extract_zip_reports_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("go.zip");
        fs::write(&path, "not a zip").unwrap();

        assert!(matches!(
            extract_zip(&path, temp.path()),
            Err(ArchiveError::Zip(_))
        ));
    }
}
