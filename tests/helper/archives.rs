//! Archive fixtures shaped like upstream Go releases

use std::io::{Cursor, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A `.tar.gz` holding `go/bin/go` and `go/VERSION`
pub fn go_tar_gz(version: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    append_dir(&mut builder, "go/");
    append_dir(&mut builder, "go/bin/");
    append_file(&mut builder, "go/bin/go", 0o755, format!("go{}", version).as_bytes());
    append_file(&mut builder, "go/VERSION", 0o644, format!("go{}", version).as_bytes());
    builder.into_inner().unwrap().finish().unwrap()
}

/// A `.zip` holding `go/bin/go.exe` and `go/VERSION`
pub fn go_zip(version: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.add_directory("go/bin/", options).unwrap();
    writer.start_file("go/bin/go.exe", options).unwrap();
    writer.write_all(format!("go{}", version).as_bytes()).unwrap();
    writer.start_file("go/VERSION", options).unwrap();
    writer.write_all(format!("go{}", version).as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn append_dir<W: Write>(builder: &mut tar::Builder<W>, path: &str) {
    let mut header = tar::Header::new_gnu();
    header.set_path(path).unwrap();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_mode(0o755);
    header.set_size(0);
    header.set_mtime(1_700_000_000);
    header.set_cksum();
    builder.append(&header, std::io::empty()).unwrap();
}

fn append_file<W: Write>(builder: &mut tar::Builder<W>, path: &str, mode: u32, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_path(path).unwrap();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(mode);
    header.set_size(data.len() as u64);
    header.set_mtime(1_700_000_000);
    header.set_cksum();
    builder.append(&header, data).unwrap();
}

pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}
