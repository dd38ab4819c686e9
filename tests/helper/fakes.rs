//! In-memory stand-ins for git, the build and the clock

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gvm::source::{BuildError, Clock, SourceBuilder, SourceControl, SourceError};
use gvm::version::GoVersion;

#[derive(Debug, Default)]
struct GitState {
    tags: Vec<String>,
    head: Option<DateTime<Utc>>,
    clones: usize,
    pulls: usize,
}

/// Git whose remote has a configurable set of tags and head commit time
#[derive(Debug, Default)]
pub struct FakeGit {
    state: Mutex<GitState>,
}

impl FakeGit {
    pub fn with_tags(tags: &[&str]) -> Self {
        let git = Self::default();
        git.set_tags(tags);
        git
    }

    pub fn set_tags(&self, tags: &[&str]) {
        self.state.lock().unwrap().tags = tags.iter().map(|t| t.to_string()).collect();
    }

    /// Moves the remote head to a commit made at `time`
    pub fn commit_at(&self, time: DateTime<Utc>) {
        self.state.lock().unwrap().head = Some(time);
    }

    pub fn clones(&self) -> usize {
        self.state.lock().unwrap().clones
    }

    pub fn pulls(&self) -> usize {
        self.state.lock().unwrap().pulls
    }
}

#[async_trait]
impl SourceControl for FakeGit {
    async fn clone_repo(&self, _source: &str, to: &Path) -> Result<(), SourceError> {
        std::fs::create_dir_all(to.join(".git")).unwrap();
        self.state.lock().unwrap().clones += 1;
        Ok(())
    }

    async fn pull(&self, _repo: &Path) -> Result<(), SourceError> {
        self.state.lock().unwrap().pulls += 1;
        Ok(())
    }

    async fn checkout(&self, _repo: &Path, _rev: &str) -> Result<(), SourceError> {
        Ok(())
    }

    async fn list_tags(&self, _repo: &Path) -> Result<Vec<String>, SourceError> {
        Ok(self.state.lock().unwrap().tags.clone())
    }

    async fn last_commit_time(&self, _repo: &Path) -> Result<DateTime<Utc>, SourceError> {
        self.state
            .lock()
            .unwrap()
            .head
            .ok_or_else(|| SourceError::InvalidTimestamp(String::new()))
    }
}

/// Builder that lays out a minimal Go tree whose `bin/go` names the
/// revision and build number
#[derive(Debug, Default)]
pub struct FakeBuilder {
    builds: Mutex<Vec<String>>,
    skip_entry_point: bool,
}

impl FakeBuilder {
    /// A build that "succeeds" but leaves only `VERSION` behind
    pub fn without_entry_point() -> Self {
        Self {
            skip_entry_point: true,
            ..Self::default()
        }
    }

    /// Revisions built so far, in order
    pub fn builds(&self) -> Vec<String> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceBuilder for FakeBuilder {
    fn preflight(&self) -> Result<(), BuildError> {
        Ok(())
    }

    async fn build(
        &self,
        _mirror: &Path,
        work_dir: &Path,
        _version: &GoVersion,
        rev: &str,
    ) -> Result<PathBuf, BuildError> {
        let mut builds = self.builds.lock().unwrap();
        builds.push(rev.to_string());

        let tree = work_dir.join("go");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("VERSION"), rev).unwrap();
        if !self.skip_entry_point {
            std::fs::create_dir_all(tree.join("bin")).unwrap();
            std::fs::write(tree.join("bin/go"), format!("{} #{}", rev, builds.len())).unwrap();
        }
        Ok(tree)
    }
}

/// Clock the test moves forward by hand
#[derive(Debug)]
pub struct SteppingClock {
    now: Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    // fixtures are written in UTC, whatever zone the tests run in
    fn is_stale(&self, updated: DateTime<Utc>) -> bool {
        gvm::source::cache::is_stale(updated, self.now(), &Utc)
    }
}
