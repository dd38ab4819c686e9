//! Catalog trait for listing binary releases

use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::catalog::error::CatalogError;
use crate::catalog::json::JsonCatalog;
use crate::catalog::listing::ListingCatalog;
use crate::catalog::release::Release;
use crate::config::{CatalogConfig, CatalogKind};

/// Trait for reading the upstream binary release catalog
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetches every release the catalog knows about, with its files
    async fn list_releases(&self) -> Result<Vec<Release>, CatalogError>;

    /// Returns the URL an artifact with `filename` is downloaded from
    fn download_url(&self, filename: &str) -> String;
}

/// Builds the catalog client selected by configuration
pub fn from_config(
    config: &CatalogConfig,
    timeout: Duration,
    proxy: Option<&reqwest::Proxy>,
) -> Arc<dyn CatalogClient> {
    let client = http_client(timeout, proxy);
    match config.kind {
        CatalogKind::Json => Arc::new(JsonCatalog::with_client(
            client,
            &config.url,
            &config.download_base,
        )),
        CatalogKind::Listing => Arc::new(ListingCatalog::with_client(client, &config.url)),
    }
}

pub(crate) fn join_url(base: &str, filename: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), filename)
}

pub(crate) fn http_client(timeout: Duration, proxy: Option<&reqwest::Proxy>) -> reqwest::Client {
    client_builder(proxy)
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// Builder shared by catalogs and the downloader
pub(crate) fn client_builder(proxy: Option<&reqwest::Proxy>) -> reqwest::ClientBuilder {
    let builder =
        reqwest::Client::builder().user_agent(concat!("gvm/", env!("CARGO_PKG_VERSION")));
    match proxy {
        Some(proxy) => builder.proxy(proxy.clone()),
        None => builder,
    }
}
