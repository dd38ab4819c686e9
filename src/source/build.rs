//! Building a Go tree from the source mirror

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::archive::DEFAULT_PAYLOAD_DIR;
use crate::process::ProcessRequest;
use crate::source::error::BuildError;
use crate::source::vcs::SourceControl;
use crate::version::GoVersion;

/// Builds Go trees from source
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait SourceBuilder: Send + Sync {
    /// Fails if a build could not even start, before any work is done
    fn preflight(&self) -> Result<(), BuildError>;

    /// Builds `version` at `rev` from the repository at `mirror`, using
    /// `work_dir` as scratch space. Returns the built tree.
    async fn build(
        &self,
        mirror: &Path,
        work_dir: &Path,
        version: &GoVersion,
        rev: &str,
    ) -> Result<PathBuf, BuildError>;
}

/// [`SourceBuilder`] running Go's own `make.bash` (`make.bat` on Windows)
pub struct MakeBuilder {
    vcs: Arc<dyn SourceControl>,
    bootstrap: Option<PathBuf>,
}

impl MakeBuilder {
    pub fn new(vcs: Arc<dyn SourceControl>, bootstrap: Option<PathBuf>) -> Self {
        Self { vcs, bootstrap }
    }

    fn bootstrap(&self) -> Result<&Path, BuildError> {
        let bootstrap = self
            .bootstrap
            .as_deref()
            .ok_or(BuildError::MissingBootstrap)?;
        if !bootstrap.is_dir() {
            return Err(BuildError::BootstrapNotFound(bootstrap.to_path_buf()));
        }
        Ok(bootstrap)
    }
}

#[async_trait::async_trait]
impl SourceBuilder for MakeBuilder {
    fn preflight(&self) -> Result<(), BuildError> {
        self.bootstrap().map(|_| ())
    }

    async fn build(
        &self,
        mirror: &Path,
        work_dir: &Path,
        version: &GoVersion,
        rev: &str,
    ) -> Result<PathBuf, BuildError> {
        let bootstrap = self.bootstrap()?;
        let checkout = work_dir.join(DEFAULT_PAYLOAD_DIR);

        info!("Checking out {} into {:?}", rev, checkout);
        self.vcs
            .clone_repo(&mirror.to_string_lossy(), &checkout)
            .await?;
        self.vcs.checkout(&checkout, rev).await?;

        let git_dir = checkout.join(".git");
        tokio::fs::remove_dir_all(&git_dir)
            .await
            .or_else(ignore_not_found)
            .map_err(|source| BuildError::Io {
                path: git_dir.clone(),
                source,
            })?;

        if !version.is_tip() {
            let version_file = checkout.join("VERSION");
            tokio::fs::write(&version_file, rev)
                .await
                .map_err(|source| BuildError::Io {
                    path: version_file.clone(),
                    source,
                })?;
        }

        info!("Building Go {} with bootstrap {:?}", version, bootstrap);
        make_script()
            .current_dir(&checkout.join("src"))
            .env("GOROOT_BOOTSTRAP", bootstrap)
            .run()
            .await?;

        Ok(checkout)
    }
}

fn make_script() -> ProcessRequest {
    if cfg!(windows) {
        ProcessRequest::new("cmd").args(["/C", "make.bat"])
    } else {
        ProcessRequest::new("bash").arg("make.bash")
    }
}

fn ignore_not_found(e: std::io::Error) -> std::io::Result<()> {
    if e.kind() == std::io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(e)
    }
}
