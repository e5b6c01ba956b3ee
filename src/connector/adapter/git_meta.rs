use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::application::{GitFileMeta, GitMetaService};

/// Wall-clock budget per git subprocess.
const GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Author and last-commit metadata via `git` subprocesses, bounded by a
/// global semaphore. Anything that fails (no git, not a repo, timeout)
/// degrades to `None`.
pub struct GitSubprocessMeta {
    semaphore: Arc<Semaphore>,
}

impl GitSubprocessMeta {
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
        }
    }

    async fn run_git(&self, root: &Path, args: &[&str]) -> Option<String> {
        let _permit = self.semaphore.acquire().await.ok()?;

        let child = Command::new("git")
            .arg("-C")
            .arg(root)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(GIT_TIMEOUT, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("git spawn failed: {e}");
                return None;
            }
            Err(_) => {
                debug!("git timed out after {GIT_TIMEOUT:?}");
                return None;
            }
        };

        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl Default for GitSubprocessMeta {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl GitMetaService for GitSubprocessMeta {
    async fn file_meta(&self, root: &Path, rel_path: &str) -> Option<GitFileMeta> {
        let line = self
            .run_git(root, &["log", "-1", "--format=%an|%cI", "--", rel_path])
            .await?;
        let (author, date) = line.split_once('|')?;
        Some(GitFileMeta {
            author: Some(author.trim().to_string()).filter(|s| !s.is_empty()),
            last_modified: Some(date.trim().to_string()).filter(|s| !s.is_empty()),
        })
    }

    async fn active_branch(&self, root: &Path) -> Option<String> {
        self.run_git(root, &["rev-parse", "--abbrev-ref", "HEAD"]).await
    }
}
