//! Bucket-style XML object listing
//!
//! Older deployments serve binaries from a storage bucket whose root returns a
//! `ListBucketResult` document. Pages are chained through `NextMarker`, passed
//! back as the `marker` query parameter. Object keys follow
//! `go<version>.<os>-<arch>.<ext>`.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::client::{CatalogClient, http_client, join_url};
use crate::catalog::error::CatalogError;
use crate::catalog::release::{Artifact, ArtifactKind, Release};
use crate::version::GoVersion;

/// Default bucket serving Go binaries
pub const DEFAULT_URL: &str = "https://storage.googleapis.com/golang";

static OBJECT_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^go(.+?)\.([a-z0-9]+)-([a-z0-9]+)\.(tar\.gz|zip|msi|pkg)$")
        .expect("object key regex is valid")
});

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<Contents>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Contents {
    key: String,
}

/// Catalog implementation for XML bucket listings
pub struct ListingCatalog {
    client: reqwest::Client,
    url: String,
}

impl ListingCatalog {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self::with_client(http_client(timeout, None), url)
    }

    pub fn with_client(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    async fn fetch_page(&self, marker: &str) -> Result<ListBucketResult, CatalogError> {
        let url = reqwest::Url::parse_with_params(&self.url, &[("marker", marker)]).map_err(
            |e| CatalogError::InvalidUrl {
                url: self.url.clone(),
                reason: e.to_string(),
            },
        )?;

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!("Bucket listing returned status {}: {}", status, self.url);
            return Err(CatalogError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        quick_xml::de::from_str(&body).map_err(|e| {
            warn!("Failed to parse bucket listing: {}", e);
            CatalogError::InvalidResponse(e.to_string())
        })
    }

    /// Walks every page of the listing and returns all object keys
    async fn list_keys(&self) -> Result<Vec<String>, CatalogError> {
        let mut keys = Vec::new();
        let mut marker = String::new();

        loop {
            let page = self.fetch_page(&marker).await?;
            debug!(
                "Listing page after {:?}: {} objects (truncated: {})",
                marker,
                page.contents.len(),
                page.is_truncated
            );
            keys.extend(page.contents.into_iter().map(|c| c.key));

            match page.next_marker {
                Some(next) if !next.is_empty() && next != marker => marker = next,
                _ => return Ok(keys),
            }
        }
    }
}

#[async_trait::async_trait]
impl CatalogClient for ListingCatalog {
    async fn list_releases(&self) -> Result<Vec<Release>, CatalogError> {
        let keys = self.list_keys().await?;
        Ok(releases_from_keys(&keys))
    }

    fn download_url(&self, filename: &str) -> String {
        join_url(&self.url, filename)
    }
}

/// Parses a single object key into a release version and artifact
fn parse_object_key(key: &str) -> Option<(String, Artifact)> {
    let caps = OBJECT_KEY_RE.captures(key)?;
    let version = caps[1].to_string();
    let kind = match &caps[4] {
        "tar.gz" | "zip" => ArtifactKind::Archive,
        _ => ArtifactKind::Installer,
    };

    let artifact = Artifact {
        filename: key.to_string(),
        os: caps[2].to_string(),
        arch: caps[3].to_string(),
        version: format!("go{}", version),
        sha256: String::new(),
        size: 0,
        kind,
    };
    Some((version, artifact))
}

/// Groups object keys into releases, skipping keys that are not Go artifacts
fn releases_from_keys(keys: &[String]) -> Vec<Release> {
    let mut by_version: BTreeMap<String, Vec<Artifact>> = BTreeMap::new();
    for key in keys {
        if let Some((version, artifact)) = parse_object_key(key) {
            by_version.entry(version).or_default().push(artifact);
        }
    }

    by_version
        .into_iter()
        .filter_map(|(version, files)| {
            let parsed = GoVersion::parse(&version).ok()?;
            Some(Release {
                version: format!("go{}", version),
                stable: parsed.is_stable(),
                files,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use rstest::rstest;

    fn page(keys: &[&str], next_marker: Option<&str>) -> String {
        let contents: String = keys
            .iter()
            .map(|k| format!("<Contents><Key>{}</Key><Size>10</Size></Contents>", k))
            .collect();
        let (truncated, marker) = match next_marker {
            Some(m) => ("true", format!("<NextMarker>{}</NextMarker>", m)),
            None => ("false", String::new()),
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://doc.s3.amazonaws.com/2006-03-01"><Name>golang</Name><Prefix></Prefix><Marker></Marker><IsTruncated>{}</IsTruncated>{}{}</ListBucketResult>"#,
            truncated, marker, contents
        )
    }

    #[rstest]
    #[case("go1.7.3.linux-amd64.tar.gz", Some(("1.7.3", "linux", "amd64", ArtifactKind::Archive)))]
    #[case("go1.21rc2.linux-armv6l.tar.gz", Some(("1.21rc2", "linux", "armv6l", ArtifactKind::Archive)))]
    #[case("go1.8.windows-amd64.zip", Some(("1.8", "windows", "amd64", ArtifactKind::Archive)))]
    #[case("go1.8.windows-amd64.msi", Some(("1.8", "windows", "amd64", ArtifactKind::Installer)))]
    #[case("go1.7.3.src.tar.gz", None)]
    #[case("go1.7.3.linux-amd64.tar.gz.sha256", None)]
    #[case("getgo/installer.exe", None)]
    fn parse_object_key_extracts_version_os_arch(
        #[case] key: &str,
        #[case] expected: Option<(&str, &str, &str, ArtifactKind)>,
    ) {
        let parsed = parse_object_key(key)
            .map(|(v, a)| (v, a.os, a.arch, a.kind));
        let expected = expected.map(|(v, os, arch, kind)| {
            (v.to_string(), os.to_string(), arch.to_string(), kind)
        });
        assert_eq!(parsed, expected);
    }

    #[test]
    fn releases_from_keys_groups_artifacts_by_version() {
        let keys: Vec<String> = [
            "go1.8.linux-amd64.tar.gz",
            "go1.8.darwin-amd64.tar.gz",
            "go1.9beta1.linux-amd64.tar.gz",
            "go1.8.src.tar.gz",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let releases = releases_from_keys(&keys);

        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].version, "go1.8");
        assert_eq!(releases[0].files.len(), 2);
        assert!(releases[0].stable);
        assert_eq!(releases[1].version, "go1.9beta1");
        assert!(!releases[1].stable);
    }

    #[tokio::test]
    async fn list_releases_follows_next_marker() {
        let mut server = Server::new_async().await;

        let first = server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("marker".into(), "".into()))
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(page(
                &["go1.7.3.linux-amd64.tar.gz", "go1.7.3.windows-amd64.zip"],
                Some("go1.7.3.windows-amd64.zip"),
            ))
            .create_async()
            .await;

        let second = server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded(
                "marker".into(),
                "go1.7.3.windows-amd64.zip".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(page(&["go1.8.linux-amd64.tar.gz"], None))
            .create_async()
            .await;

        let catalog = ListingCatalog::new(&server.url(), Duration::from_secs(5));
        let releases = catalog.list_releases().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let versions: Vec<&str> = releases.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["go1.7.3", "go1.8"]);
        assert!(releases[1].find_artifact("linux", "amd64").is_some());
    }

    #[tokio::test]
    async fn list_releases_reports_non_ok_status() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let catalog = ListingCatalog::new(&server.url(), Duration::from_secs(5));
        let result = catalog.list_releases().await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(CatalogError::Status { status: 403, .. })
        ));
    }
}
