//! Version-control client used for the source mirror and build checkouts

use std::path::Path;

use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::process::ProcessRequest;
use crate::source::error::SourceError;

/// Operations the source mirror and the build need from version control
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait SourceControl: Send + Sync {
    /// Clones `source` (a URL or a local repository) into `to`, which must
    /// not exist yet
    async fn clone_repo(&self, source: &str, to: &Path) -> Result<(), SourceError>;

    /// Pulls the latest history into `repo`
    async fn pull(&self, repo: &Path) -> Result<(), SourceError>;

    /// Checks out `rev` (a tag or branch) in `repo`
    async fn checkout(&self, repo: &Path, rev: &str) -> Result<(), SourceError>;

    /// Lists every tag in `repo`
    async fn list_tags(&self, repo: &Path) -> Result<Vec<String>, SourceError>;

    /// Commit time of `repo`'s current head
    async fn last_commit_time(&self, repo: &Path) -> Result<DateTime<Utc>, SourceError>;
}

/// [`SourceControl`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct Git {
    program: String,
}

impl Default for Git {
    fn default() -> Self {
        Self::new("git")
    }
}

impl Git {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn command(&self, repo: &Path) -> ProcessRequest {
        ProcessRequest::new(&self.program).current_dir(repo)
    }
}

#[async_trait::async_trait]
impl SourceControl for Git {
    async fn clone_repo(&self, source: &str, to: &Path) -> Result<(), SourceError> {
        ProcessRequest::new(&self.program)
            .arg("clone")
            .arg(source)
            .arg(to)
            .run()
            .await?;
        Ok(())
    }

    async fn pull(&self, repo: &Path) -> Result<(), SourceError> {
        self.command(repo).arg("pull").run().await?;
        Ok(())
    }

    async fn checkout(&self, repo: &Path, rev: &str) -> Result<(), SourceError> {
        self.command(repo).args(["checkout", rev]).run().await?;
        Ok(())
    }

    async fn list_tags(&self, repo: &Path) -> Result<Vec<String>, SourceError> {
        let output = self.command(repo).arg("tag").run().await?;
        Ok(output
            .stdout
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect())
    }

    async fn last_commit_time(&self, repo: &Path) -> Result<DateTime<Utc>, SourceError> {
        let output = self
            .command(repo)
            .args(["log", "-n", "1", "--pretty=format:%ct"])
            .run()
            .await?;
        parse_commit_time(&output.stdout)
    }
}

/// Parses the unix timestamp printed by `git log --pretty=format:%ct`
fn parse_commit_time(lines: &[String]) -> Result<DateTime<Utc>, SourceError> {
    let line = lines
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .unwrap_or_default();

    line.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| SourceError::InvalidTimestamp(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["1700000000"], Some(1_700_000_000))]
    #[case(&["", "1700000000  "], Some(1_700_000_000))]
    #[case(&[], None)]
    #[case(&["yesterday"], None)]
    fn parse_commit_time_reads_last_line(#[case] lines: &[&str], #[case] expected: Option<i64>) {
        let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        let result = parse_commit_time(&lines).ok().map(|t| t.timestamp());
        assert_eq!(result, expected);
    }

    #[cfg(unix)]
    mod git {
        use super::super::*;
        use tempfile::TempDir;

        fn git_available() -> bool {
            std::process::Command::new("git")
                .arg("--version")
                .output()
                .is_ok_and(|o| o.status.success())
        }

        async fn git(repo: &Path, args: &[&str]) {
            ProcessRequest::new("git")
                .args(["-c", "user.name=gvm", "-c", "user.email=gvm@example.com"])
                .args(args.iter().copied())
                .current_dir(repo)
                .env("GIT_AUTHOR_DATE", "1700000000 +0000")
                .env("GIT_COMMITTER_DATE", "1700000000 +0000")
                .run()
                .await
                .unwrap();
        }

        async fn upstream(temp: &TempDir) -> std::path::PathBuf {
            let repo = temp.path().join("upstream");
            std::fs::create_dir(&repo).unwrap();
            git(&repo, &["init", "-q", "-b", "master"]).await;
            std::fs::write(repo.join("README"), "go").unwrap();
            git(&repo, &["add", "README"]).await;
            git(&repo, &["commit", "-q", "-m", "initial"]).await;
            git(&repo, &["tag", "go1.21.0"]).await;
            git(&repo, &["tag", "weekly.2011-01-01"]).await;
            repo
        }

        #[tokio::test]
        async fn git_clones_and_reads_tags_and_head_time() {
            if !git_available() {
                return;
            }
            let temp = TempDir::new().unwrap();
            let upstream = upstream(&temp).await;
            let clone = temp.path().join("clone");
            let git = Git::default();

            git.clone_repo(&upstream.to_string_lossy(), &clone)
                .await
                .unwrap();
            git.checkout(&clone, "go1.21.0").await.unwrap();

            let mut tags = git.list_tags(&clone).await.unwrap();
            tags.sort();
            assert_eq!(tags, vec!["go1.21.0", "weekly.2011-01-01"]);
            assert_eq!(
                git.last_commit_time(&clone).await.unwrap().timestamp(),
                1_700_000_000
            );
        }

        #[tokio::test]
        async fn git_reports_unknown_revision() {
            if !git_available() {
                return;
            }
            let temp = TempDir::new().unwrap();
            let upstream = upstream(&temp).await;

            let result = Git::default().checkout(&upstream, "go9.9.9").await;

            assert!(matches!(result, Err(SourceError::Git(_))));
        }
    }
}
