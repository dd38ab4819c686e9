//! HTTP download with bounded retry
//!
//! A 404 is terminal and reported as [`DownloadError::NotFound`] so callers
//! can fall back to another source. Other failures are retried up to
//! [`MAX_ATTEMPTS`] times; every attempt recreates the destination file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::catalog::client::client_builder;

/// Number of attempts before the last error is surfaced
pub const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Download of {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid download url {0}")]
    InvalidUrl(String),

    #[error("Failed to create {path:?}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl DownloadError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DownloadError::Status { .. } | DownloadError::Network(_) | DownloadError::Write { .. }
        )
    }
}

pub struct Downloader {
    client: reqwest::Client,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        Self::with_proxy(None)
    }

    /// Downloader whose requests all go through `proxy`
    pub fn with_proxy(proxy: Option<&reqwest::Proxy>) -> Self {
        Self {
            client: client_builder(proxy)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Downloads `url` into `destination_dir`, naming the file after the
    /// URL's last path segment. Returns the written file.
    pub async fn fetch(
        &self,
        url: &str,
        destination_dir: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, DownloadError> {
        debug!("Downloading {}", url);
        let path = destination_dir.join(file_name(url)?);

        let mut attempt = 1;
        loop {
            match self.fetch_once(url, &path, timeout).await {
                Ok(size) => {
                    debug!("Downloaded {} bytes to {:?}", size, path);
                    return Ok(path);
                }
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!("Download attempt {} of {} failed: {}", attempt, url, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(
        &self,
        url: &str,
        path: &Path,
        timeout: Duration,
    ) -> Result<u64, DownloadError> {
        let mut response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DownloadError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let write_error = |source| DownloadError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|source| DownloadError::Create {
                path: path.to_path_buf(),
                source,
            })?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_error)?;

        Ok(written)
    }
}

fn file_name(url: &str) -> Result<&str, DownloadError> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "..")
        .ok_or_else(|| DownloadError::InvalidUrl(url.to_string()))
}
