use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::paths;

/// Canonical identifier of a project: the truncated hash of its normalized
/// absolute root. All per-project storage (vector table, edge scoping) keys
/// off this value, which is what isolates projects from each other.
pub fn project_id(root: &Path) -> String {
    let normalized = paths::normalize(&root.to_string_lossy());
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{digest:x}")[..32].to_string()
}

/// An indexed project rooted at an absolute path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    id: String,
    root: PathBuf,
}

impl Project {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, crate::domain::DomainError> {
        let root = root
            .as_ref()
            .canonicalize()
            .map_err(|e| crate::domain::DomainError::invalid_input(format!("Invalid root: {e}")))?;
        let id = project_id(&root);
        Ok(Self { id, root })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_is_32_hex() {
        let id = project_id(Path::new("/home/dev/proj"));
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_project_id_normalizes_before_hashing() {
        assert_eq!(
            project_id(Path::new("/home/dev//proj")),
            project_id(Path::new("/home/dev/proj"))
        );
    }

    #[test]
    fn test_distinct_roots_distinct_ids() {
        assert_ne!(
            project_id(Path::new("/home/dev/a")),
            project_id(Path::new("/home/dev/b"))
        );
    }
}
