use std::path::Path;

use async_trait::async_trait;

/// Author and last-modified date for one file, as far as git knows.
#[derive(Debug, Clone, Default)]
pub struct GitFileMeta {
    pub author: Option<String>,
    pub last_modified: Option<String>,
}

/// Async side channel over a `git` subprocess. Missing metadata is never an
/// error; callers get `None` and move on.
#[async_trait]
pub trait GitMetaService: Send + Sync {
    async fn file_meta(&self, root: &Path, rel_path: &str) -> Option<GitFileMeta>;

    async fn active_branch(&self, root: &Path) -> Option<String>;
}
