use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{json, listing};

// =============================================================================
// Defaults
// =============================================================================

/// Default timeout for HTTP requests in seconds (3 minutes)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 180;

/// Upstream git repository Go is built from
pub const DEFAULT_SOURCE_URL: &str = "https://go.googlesource.com/go";

/// Name of the optional configuration file inside the home directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Log file name inside `<home>/logs`
pub const LOG_FILE_NAME: &str = "gvm.log";

/// gvm configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Root holding `cache/`, `versions/` and `logs/`
    pub home: PathBuf,
    /// Target OS in Go naming (`linux`, `darwin`, `windows`, ...)
    pub os: String,
    /// Target architecture in Go naming (`amd64`, `arm64`, `arm`, ...)
    pub arch: String,
    pub catalog: CatalogConfig,
    /// Git remote the source mirror is cloned from
    pub source_url: String,
    pub http_timeout_secs: u64,
    /// Go installation used to build from source. Falls back to
    /// `GOROOT_BOOTSTRAP`, then `GOROOT`.
    pub bootstrap: Option<PathBuf>,
    /// Proxy for every catalog request and download (`http://`, `https://`
    /// or `socks5://`). Unset leaves reqwest's `HTTP(S)_PROXY` handling on.
    pub proxy: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: home_dir(),
            os: host_os().to_string(),
            arch: host_arch().to_string(),
            catalog: CatalogConfig::default(),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            bootstrap: None,
            proxy: None,
        }
    }
}

impl Config {
    /// Loads `<home>/config.json` on top of the defaults, if present
    pub fn load(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE_NAME);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<Config>(&contents)
                .map_err(|source| ConfigError::Parse { path, source })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        config.home = home.to_path_buf();
        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.home.join("versions")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Returns the path to the log file.
    pub fn log_path(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE_NAME)
    }

    /// Parsed [`Config::proxy`]
    pub fn http_proxy(&self) -> Result<Option<reqwest::Proxy>, ConfigError> {
        self.proxy
            .as_deref()
            .map(|url| {
                reqwest::Proxy::all(url).map_err(|source| ConfigError::InvalidProxy {
                    url: url.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Bootstrap toolchain for source builds
    pub fn bootstrap_toolchain(&self) -> Option<PathBuf> {
        bootstrap_with_env(
            self.bootstrap.clone(),
            std::env::var_os("GOROOT_BOOTSTRAP"),
            std::env::var_os("GOROOT"),
        )
    }
}

/// Which shape the binary catalog is served in
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// go.dev JSON release list
    #[default]
    Json,
    /// Bucket-style XML object listing
    Listing,
}

/// Binary catalog configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogConfig {
    pub kind: CatalogKind,
    pub url: String,
    /// Base URL artifact filenames are appended to (JSON catalogs only;
    /// listings download from `url`)
    pub download_base: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            kind: CatalogKind::Json,
            url: json::DEFAULT_URL.to_string(),
            download_base: json::DEFAULT_DOWNLOAD_BASE.to_string(),
        }
    }
}

impl CatalogConfig {
    /// Default configuration for a bucket listing at `url`
    pub fn listing(url: Option<&str>) -> Self {
        let url = url.unwrap_or(listing::DEFAULT_URL).to_string();
        Self {
            kind: CatalogKind::Listing,
            download_base: url.clone(),
            url,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid proxy {url:?}: {source}")]
    InvalidProxy {
        url: String,
        source: reqwest::Error,
    },
}

/// Returns the gvm home directory.
/// Uses ~/.gvm, or ./.gvm if no home directory is available.
pub fn home_dir() -> PathBuf {
    home_dir_with_env(dirs::home_dir())
}

fn home_dir_with_env(home_dir: Option<PathBuf>) -> PathBuf {
    home_dir
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gvm")
}

fn bootstrap_with_env(
    configured: Option<PathBuf>,
    goroot_bootstrap: Option<std::ffi::OsString>,
    goroot: Option<std::ffi::OsString>,
) -> Option<PathBuf> {
    configured.or_else(|| {
        [goroot_bootstrap, goroot]
            .into_iter()
            .flatten()
            .find(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}

/// Host OS in Go naming
pub fn host_os() -> &'static str {
    go_os(std::env::consts::OS)
}

/// Host architecture in Go naming
pub fn host_arch() -> &'static str {
    go_arch(std::env::consts::ARCH)
}

fn go_os(os: &'static str) -> &'static str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn go_arch(arch: &'static str) -> &'static str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        "mips64" if cfg!(target_endian = "little") => "mips64le",
        "mips" if cfg!(target_endian = "little") => "mipsle",
        other => other,
    }
}
