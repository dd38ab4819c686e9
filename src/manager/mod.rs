//! Installation orchestrator
//!
//! [`Manager`] owns the gvm home directory:
//!
//! - `versions/go<version>.<os>.<arch>/`: one installed toolchain each; the
//!   directory holding `bin/go` is the only record of an installation
//! - `cache/go` + `cache/go.meta`: the source mirror
//! - `logs/`
//!
//! Installing a release tries the binary catalog first and builds from source
//! only when the catalog has nothing for the version. Tip is always built from
//! source, and rebuilt only once the mirror has moved.

pub mod error;

pub use error::ManagerError;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::ArchiveInstaller;
use crate::catalog::{self, Artifact, CatalogClient, Release};
use crate::config::Config;
use crate::download::Downloader;
use crate::source::{
    DEFAULT_BRANCH, Git, MakeBuilder, SourceBuilder, SourceCache, SourceControl, SystemClock,
};
use crate::version::{AvailableVersion, GoVersion};

pub struct Manager {
    config: Config,
    catalog: Arc<dyn CatalogClient>,
    downloader: Downloader,
    installer: ArchiveInstaller,
    source: SourceCache,
    builder: Arc<dyn SourceBuilder>,
}

impl Manager {
    /// Creates a manager using `git`, `make.bash` and the configured catalog.
    /// Fails only on a malformed proxy.
    pub fn new(config: Config) -> Result<Self, ManagerError> {
        let proxy = config.http_proxy()?;
        let vcs: Arc<dyn SourceControl> = Arc::new(Git::default());
        let catalog =
            catalog::from_config(&config.catalog, config.http_timeout(), proxy.as_ref());
        let source = SourceCache::new(
            &config.cache_dir(),
            &config.source_url,
            vcs.clone(),
            Arc::new(SystemClock),
        );
        let builder = Arc::new(MakeBuilder::new(vcs, config.bootstrap_toolchain()));
        let mut manager = Self::with_components(config, catalog, source, builder);
        manager.downloader = Downloader::with_proxy(proxy.as_ref());
        Ok(manager)
    }

    pub fn with_components(
        config: Config,
        catalog: Arc<dyn CatalogClient>,
        source: SourceCache,
        builder: Arc<dyn SourceBuilder>,
    ) -> Self {
        let installer = ArchiveInstaller::default().require_entry_point(entry_point(&config.os));
        Self {
            config,
            catalog,
            downloader: Downloader::new(),
            installer,
            source,
            builder,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the home directory layout
    pub async fn init(&self) -> Result<(), ManagerError> {
        for dir in [
            self.config.cache_dir(),
            self.config.versions_dir(),
            self.config.logs_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(io_error(&dir))?;
        }
        Ok(())
    }

    /// Clones or pulls the source mirror
    pub async fn update_cache(&self) -> Result<(), ManagerError> {
        self.init().await?;
        self.source.refresh().await?;
        Ok(())
    }

    /// GOROOT of `version`, whether or not it is installed
    ///
    /// Named after the canonical spelling, so `1.21` and `1.21.0` share one
    /// installation.
    pub fn version_root(&self, version: &GoVersion) -> PathBuf {
        self.config.versions_dir().join(format!(
            "go{}.{}.{}",
            version.canonical(),
            self.config.os,
            self.config.arch
        ))
    }

    /// Whether `version` is installed completely
    pub fn has_version(&self, version: &GoVersion) -> bool {
        self.version_root(version)
            .join(entry_point(&self.config.os))
            .is_file()
    }

    /// Makes sure `version` is installed and returns its GOROOT
    ///
    /// A binary release is preferred. Only when the catalog has no archive
    /// for the version and platform is it built from source; any other
    /// catalog or download failure is returned as is.
    pub async fn install(&self, version: &GoVersion) -> Result<PathBuf, ManagerError> {
        if version.is_tip() {
            return self.ensure_tip().await;
        }
        if self.has_version(version) {
            debug!("go{} already installed", version);
            return Ok(self.version_root(version));
        }

        match self.install_binary(version).await {
            Ok(root) => Ok(root),
            Err(e) if e.is_not_found() => {
                info!("{}; installing from source", e);
                self.install_source(version).await
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`Manager::install`], but never uses the binary catalog
    pub async fn build(&self, version: &GoVersion) -> Result<PathBuf, ManagerError> {
        if version.is_tip() {
            return self.ensure_tip().await;
        }
        if self.has_version(version) {
            return Ok(self.version_root(version));
        }
        self.install_source(version).await
    }

    async fn install_binary(&self, version: &GoVersion) -> Result<PathBuf, ManagerError> {
        self.init().await?;
        let artifact = self.find_binary(version).await?;
        let url = self.catalog.download_url(&artifact.filename);

        let cache_dir = self.config.cache_dir();
        let download_dir = tempfile::Builder::new()
            .prefix("download-")
            .tempdir_in(&cache_dir)
            .map_err(io_error(&cache_dir))?;
        let archive = self
            .downloader
            .fetch(&url, download_dir.path(), self.config.http_timeout())
            .await?;

        self.install_tree(archive, self.version_root(version)).await
    }

    async fn find_binary(&self, version: &GoVersion) -> Result<Artifact, ManagerError> {
        let (os, arch) = (&self.config.os, &self.config.arch);
        let releases = self.catalog.list_releases().await?;

        releases
            .iter()
            .filter(|release| release.go_version().as_ref() == Some(version))
            .find_map(|release| release.find_artifact(os, arch))
            .cloned()
            .ok_or_else(|| ManagerError::BinaryNotFound {
                version: version.to_string(),
                os: os.clone(),
                arch: arch.clone(),
            })
    }

    async fn install_source(&self, version: &GoVersion) -> Result<PathBuf, ManagerError> {
        self.builder.preflight()?;
        self.init().await?;
        self.source.ensure().await?;

        let rev = if version.is_tip() {
            DEFAULT_BRANCH.to_string()
        } else {
            self.source
                .resolve_tag(version)
                .await?
                .ok_or_else(|| ManagerError::UnknownVersion(version.to_string()))?
        };

        let cache_dir = self.config.cache_dir();
        let work_dir = tempfile::Builder::new()
            .prefix("build-")
            .tempdir_in(&cache_dir)
            .map_err(io_error(&cache_dir))?;

        info!("Building go{} from {}", version, rev);
        let built = self
            .builder
            .build(&self.source.mirror_path(), work_dir.path(), version, &rev)
            .await?;

        self.install_tree(built, self.version_root(version)).await
    }

    async fn install_tree(&self, source: PathBuf, root: PathBuf) -> Result<PathBuf, ManagerError> {
        let installer = self.installer.clone();
        let root = tokio::task::spawn_blocking(move || installer.install_from(&source, &root))
            .await??;

        info!("Installed {:?}", root);
        Ok(root)
    }

    /// Builds tip if missing, rebuilds it if the mirror moved since the
    /// last refresh, and otherwise returns the existing build
    async fn ensure_tip(&self) -> Result<PathBuf, ManagerError> {
        let tip = GoVersion::tip();

        if self.has_version(&tip) {
            if !self.source.try_refresh().await? {
                debug!("tip is up to date");
                return Ok(self.version_root(&tip));
            }
            info!("New commits since the last tip build, rebuilding");
        }

        self.install_source(&tip).await
    }

    /// Deletes the installation of `version` and returns its former root
    ///
    /// A directory spelled differently from the canonical name (`go1.21.linux.amd64`
    /// for `1.21.0`) is found as long as it names an equal version.
    pub async fn remove(&self, version: &GoVersion) -> Result<PathBuf, ManagerError> {
        let mut root = self.version_root(version);

        let metadata = match tokio::fs::metadata(&root).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                root = self
                    .installed_entries()
                    .await?
                    .into_iter()
                    .find_map(|(installed, path)| (&installed == version).then_some(path))
                    .ok_or_else(|| ManagerError::NotInstalled(version.to_string()))?;
                tokio::fs::metadata(&root).await.map_err(io_error(&root))?
            }
            Err(source) => return Err(ManagerError::Io { path: root, source }),
        };
        if !metadata.is_dir() {
            return Err(ManagerError::NotADirectory(root));
        }

        tokio::fs::remove_dir_all(&root)
            .await
            .map_err(io_error(&root))?;
        info!("Removed {:?}", root);
        Ok(root)
    }

    /// Installed versions for the configured os/arch, ascending
    ///
    /// Entries that don't parse as a version directory are skipped.
    pub async fn installed(&self) -> Result<Vec<GoVersion>, ManagerError> {
        let mut versions: Vec<GoVersion> = self
            .installed_entries()
            .await?
            .into_iter()
            .map(|(version, _)| version)
            .collect();
        versions.sort();
        Ok(versions)
    }

    async fn installed_entries(&self) -> Result<Vec<(GoVersion, PathBuf)>, ManagerError> {
        let dir = self.config.versions_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(ManagerError::Io { path: dir, source }),
        };

        let suffix = format!(".{}.{}", self.config.os, self.config.arch);
        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&dir))? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(raw) = name.strip_suffix(&suffix).and_then(|n| n.strip_prefix("go")) else {
                continue;
            };
            if !entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            match GoVersion::parse(raw) {
                Ok(version) => versions.push((version, entry.path())),
                Err(e) => debug!("Skipping {:?}: {}", name, e),
            }
        }
        Ok(versions)
    }

    /// Everything installable, merged from the source mirror and the binary
    /// catalog
    ///
    /// Without a mirror only binaries are listed. With a mirror, a failing
    /// catalog degrades the result to source-only versions instead of
    /// failing.
    pub async fn available(&self) -> Result<Vec<AvailableVersion>, ManagerError> {
        if !self.source.exists() {
            return Ok(self
                .available_binaries()
                .await?
                .into_iter()
                .map(AvailableVersion::binary)
                .collect());
        }

        let mut merged: BTreeMap<GoVersion, AvailableVersion> = self
            .available_source()
            .await?
            .into_iter()
            .map(|v| (v.clone(), AvailableVersion::source(v)))
            .collect();

        match self.available_binaries().await {
            Ok(binaries) => {
                for version in binaries {
                    merged
                        .entry(version.clone())
                        .and_modify(|available| available.has_binary = true)
                        .or_insert_with(|| AvailableVersion::binary(version));
                }
            }
            Err(e) => warn!("Failed to list available binary versions: {}", e),
        }

        Ok(merged.into_values().collect())
    }

    /// Versions with a binary archive for the configured os/arch
    pub async fn available_binaries(&self) -> Result<Vec<GoVersion>, ManagerError> {
        let (os, arch) = (&self.config.os, &self.config.arch);
        let mut versions: Vec<GoVersion> = self
            .catalog
            .list_releases()
            .await?
            .iter()
            .filter(|release| release.find_artifact(os, arch).is_some())
            .filter_map(Release::go_version)
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// Versions tagged in the source mirror, plus tip. Empty without a
    /// mirror.
    pub async fn available_source(&self) -> Result<Vec<GoVersion>, ManagerError> {
        if !self.source.exists() {
            return Ok(Vec::new());
        }
        Ok(self.source.list_versions().await?)
    }

    /// Removes every installed version except the newest stable release and
    /// the newest prerelease (or tip) above it. Returns what was removed.
    pub async fn purge(&self) -> Result<Vec<GoVersion>, ManagerError> {
        let doomed = purge_candidates(&self.installed().await?);
        for version in &doomed {
            self.remove(version).await?;
        }
        Ok(doomed)
    }
}

/// Selects what [`Manager::purge`] removes from an ascending version list
fn purge_candidates(installed: &[GoVersion]) -> Vec<GoVersion> {
    let (below, above) = match installed.iter().rposition(GoVersion::is_stable) {
        Some(i) => (&installed[..i], &installed[i + 1..]),
        None => (&installed[..0], installed),
    };

    let mut doomed = below.to_vec();
    if let Some((_, older)) = above.split_last() {
        doomed.extend_from_slice(older);
    }
    doomed
}

/// `bin/go` relative to a GOROOT, `bin/go.exe` on Windows
fn entry_point(os: &str) -> PathBuf {
    let go = if os == "windows" { "go.exe" } else { "go" };
    Path::new("bin").join(go)
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> ManagerError + '_ {
    move |source| ManagerError::Io {
        path: path.to_path_buf(),
        source,
    }
}
