//! go.dev JSON release list

use std::time::Duration;

use tracing::{debug, warn};

use crate::catalog::client::{CatalogClient, http_client, join_url};
use crate::catalog::error::CatalogError;
use crate::catalog::release::Release;

/// Default release list, including unstable and archived releases
pub const DEFAULT_URL: &str = "https://go.dev/dl/?mode=json&include=all";

/// Default base URL artifacts are downloaded from
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://go.dev/dl/";

/// Catalog implementation for the go.dev JSON API
pub struct JsonCatalog {
    client: reqwest::Client,
    url: String,
    download_base: String,
}

impl JsonCatalog {
    pub fn new(url: &str, download_base: &str, timeout: Duration) -> Self {
        Self::with_client(http_client(timeout, None), url, download_base)
    }

    pub fn with_client(client: reqwest::Client, url: &str, download_base: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            download_base: download_base.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl CatalogClient for JsonCatalog {
    async fn list_releases(&self) -> Result<Vec<Release>, CatalogError> {
        debug!("Fetching release list from {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Release list returned status {}: {}", status, self.url);
            return Err(CatalogError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let releases: Vec<Release> = response.json().await.map_err(|e| {
            warn!("Failed to parse release list: {}", e);
            CatalogError::InvalidResponse(e.to_string())
        })?;

        debug!("Catalog lists {} releases", releases.len());
        Ok(releases)
    }

    fn download_url(&self, filename: &str) -> String {
        join_url(&self.download_base, filename)
    }
}
