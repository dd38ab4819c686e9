//! Shared fixtures for integration tests

#![allow(dead_code)]

pub mod archives;
pub mod fakes;

pub use archives::{go_tar_gz, go_zip, write_file};
pub use fakes::{FakeBuilder, FakeGit, SteppingClock};

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use gvm::catalog::CatalogClient;
use gvm::config::Config;
use gvm::manager::Manager;
use gvm::source::SourceCache;

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn linux_amd64(temp: &TempDir) -> Config {
    Config {
        home: temp.path().to_path_buf(),
        os: "linux".to_string(),
        arch: "amd64".to_string(),
        ..Config::default()
    }
}

/// go.dev style JSON for releases that each ship one linux/amd64 archive
pub fn json_catalog(versions: &[&str]) -> String {
    let releases: Vec<serde_json::Value> = versions
        .iter()
        .map(|v| {
            serde_json::json!({
                "version": format!("go{}", v),
                "stable": !v.contains("rc") && !v.contains("beta"),
                "files": [
                    {
                        "filename": format!("go{}.linux-amd64.tar.gz", v),
                        "os": "linux",
                        "arch": "amd64",
                        "version": format!("go{}", v),
                        "sha256": "",
                        "size": 0,
                        "kind": "archive"
                    },
                    {
                        "filename": format!("go{}.src.tar.gz", v),
                        "os": "",
                        "arch": "",
                        "version": format!("go{}", v),
                        "sha256": "",
                        "size": 0,
                        "kind": "source"
                    }
                ]
            })
        })
        .collect();
    serde_json::Value::Array(releases).to_string()
}

/// A manager wired to `catalog`, a fake git and a fake builder
pub fn manager_with(
    config: Config,
    catalog: Arc<dyn CatalogClient>,
    git: Arc<FakeGit>,
    builder: Arc<FakeBuilder>,
    clock: Arc<SteppingClock>,
) -> Manager {
    let source = SourceCache::new(&config.cache_dir(), &config.source_url, git, clock);
    Manager::with_components(config, catalog, source, builder)
}
