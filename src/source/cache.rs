//! Local mirror of the upstream Go repository
//!
//! The mirror lives at `<cache>/go` and its metadata at `<cache>/go.meta`,
//! a JSON document `{"Updated": <timestamp>}` recording the last refresh.
//! Freshness is judged per calendar day (UTC): a mirror refreshed earlier
//! today is fresh no matter how many hours have passed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::archive::staging_path;
use crate::source::error::SourceError;
use crate::source::vcs::SourceControl;
use crate::version::GoVersion;

/// Directory name of the mirror inside the cache directory
pub const MIRROR_DIR: &str = "go";

/// Metadata file next to the mirror
pub const META_FILE: &str = "go.meta";

/// Prefix of release tags, e.g. `go1.21.0`
pub const TAG_PREFIX: &str = "go";

/// Branch tip is built from
pub const DEFAULT_BRANCH: &str = "master";

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Whether `updated` falls on an earlier calendar day than now, in the
    /// local time zone
    fn is_stale(&self, updated: DateTime<Utc>) -> bool {
        is_stale(updated, self.now(), &Local)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CacheMeta {
    #[serde(rename = "Updated")]
    updated: DateTime<Utc>,
}

/// Manages the mirror clone and its refresh metadata
pub struct SourceCache {
    cache_dir: PathBuf,
    url: String,
    vcs: Arc<dyn SourceControl>,
    clock: Arc<dyn Clock>,
}

impl SourceCache {
    pub fn new(
        cache_dir: &Path,
        url: &str,
        vcs: Arc<dyn SourceControl>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            url: url.to_string(),
            vcs,
            clock,
        }
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.cache_dir.join(MIRROR_DIR)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.cache_dir.join(META_FILE)
    }

    pub fn exists(&self) -> bool {
        self.mirror_path().is_dir()
    }

    /// Clones the mirror if it is missing. An existing mirror is left alone,
    /// however old.
    pub async fn ensure(&self) -> Result<(), SourceError> {
        if self.exists() {
            return Ok(());
        }
        self.refresh().await
    }

    /// Clones the mirror if missing, otherwise pulls, then records the
    /// refresh time
    pub async fn refresh(&self) -> Result<(), SourceError> {
        if self.exists() {
            info!("Pulling Go source updates into {:?}", self.mirror_path());
            self.vcs.pull(&self.mirror_path()).await?;
        } else {
            self.clone_mirror().await?;
        }
        self.write_meta(self.clock.now()).await
    }

    async fn clone_mirror(&self) -> Result<(), SourceError> {
        let target = self.mirror_path();
        let staging = staging_path(&target);
        info!("Cloning {} into {:?}", self.url, target);

        remove_dir_if_exists(&staging).await?;
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(io_error(&self.cache_dir))?;

        let cloned = match self.vcs.clone_repo(&self.url, &staging).await {
            Ok(()) => tokio::fs::rename(&staging, &target)
                .await
                .map_err(io_error(&target)),
            Err(e) => Err(e),
        };
        if cloned.is_err() {
            if let Err(e) = remove_dir_if_exists(&staging).await {
                warn!("Failed to remove partial clone {:?}: {}", staging, e);
            }
        }
        cloned
    }

    /// Time of the last recorded refresh, `None` if never recorded
    pub async fn last_updated(&self) -> Result<Option<DateTime<Utc>>, SourceError> {
        let path = self.meta_path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SourceError::Io { path, source }),
        };
        let meta: CacheMeta = serde_json::from_str(&contents)
            .map_err(|source| SourceError::Metadata { path, source })?;
        Ok(Some(meta.updated))
    }

    async fn write_meta(&self, updated: DateTime<Utc>) -> Result<(), SourceError> {
        let path = self.meta_path();
        let contents = serde_json::to_string(&CacheMeta { updated }).map_err(|source| {
            SourceError::Metadata {
                path: path.clone(),
                source,
            }
        })?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(io_error(&path))?;
        debug!("Source cache updated at {}", updated);
        Ok(())
    }

    /// Whether the mirror needs a refresh before it can be trusted
    pub async fn is_stale(&self) -> Result<bool, SourceError> {
        Ok(match self.last_updated().await? {
            Some(updated) => self.clock.is_stale(updated),
            None => true,
        })
    }

    /// Whether `tag` exists, refreshing the mirror once if it does not
    pub async fn has_tag(&self, tag: &str) -> Result<bool, SourceError> {
        let found = |tags: &[String]| tags.iter().any(|t| t == tag);

        if found(&self.tags().await?) {
            return Ok(true);
        }
        debug!("Tag {} not in mirror, refreshing", tag);
        self.refresh().await?;
        Ok(found(&self.tags().await?))
    }

    /// Finds the release tag for `version`, refreshing the mirror once if
    /// none matches
    ///
    /// The tag spelled exactly like the version wins; otherwise any tag that
    /// parses to an equal version (`go1.21.0` for `1.21`).
    pub async fn resolve_tag(&self, version: &GoVersion) -> Result<Option<String>, SourceError> {
        if let Some(tag) = match_tag(&self.tags().await?, version) {
            return Ok(Some(tag));
        }
        debug!("No tag for {} in mirror, refreshing", version);
        self.refresh().await?;
        Ok(match_tag(&self.tags().await?, version))
    }

    async fn tags(&self) -> Result<Vec<String>, SourceError> {
        self.vcs.list_tags(&self.mirror_path()).await
    }

    /// Every release tag as a version, plus tip, sorted ascending
    pub async fn list_versions(&self) -> Result<Vec<GoVersion>, SourceError> {
        let mut versions: Vec<GoVersion> = self
            .tags()
            .await?
            .iter()
            .filter_map(|tag| tag_version(tag))
            .collect();
        versions.push(GoVersion::tip());
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    pub async fn last_commit_time(&self) -> Result<DateTime<Utc>, SourceError> {
        self.vcs.last_commit_time(&self.mirror_path()).await
    }

    /// Refreshes a stale mirror and reports whether its head moved past the
    /// previous refresh
    ///
    /// A fresh mirror is not touched and reports no updates. A missing mirror
    /// is cloned and always reports updates.
    pub async fn try_refresh(&self) -> Result<bool, SourceError> {
        if !self.exists() {
            info!("Go source cache not found");
            self.refresh().await?;
            return Ok(true);
        }

        let previous = self.last_updated().await?;
        if let Some(updated) = previous {
            if !self.clock.is_stale(updated) {
                debug!("Source cache refreshed at {}, still fresh", updated);
                return Ok(false);
            }
        }

        info!("Fetching Go source updates");
        self.refresh().await?;

        let head = self.last_commit_time().await?;
        let updates = previous.is_none_or(|updated| updated < head);
        info!(
            "Last refresh {:?}, last commit {}: {}",
            previous,
            head,
            if updates {
                "new commits since last build"
            } else {
                "no new commits since last build"
            }
        );
        Ok(updates)
    }
}

/// Calendar-day staleness as seen in `tz`; a refresh time in the future
/// counts as fresh
pub fn is_stale<Tz: TimeZone>(updated: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> bool {
    if now < updated {
        return false;
    }
    updated.with_timezone(tz).date_naive() != now.with_timezone(tz).date_naive()
}

/// Version a release tag names, `None` for other tags
pub fn tag_version(tag: &str) -> Option<GoVersion> {
    let raw = tag.strip_prefix(TAG_PREFIX)?;
    if !raw.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    GoVersion::parse(raw).ok()
}

fn match_tag(tags: &[String], version: &GoVersion) -> Option<String> {
    let exact = format!("{}{}", TAG_PREFIX, version.literal());
    if tags.contains(&exact) {
        return Some(exact);
    }
    tags.iter()
        .find(|tag| tag_version(tag).as_ref() == Some(version))
        .cloned()
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> SourceError + '_ {
    move |source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

async fn remove_dir_if_exists(path: &Path) -> Result<(), SourceError> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}
