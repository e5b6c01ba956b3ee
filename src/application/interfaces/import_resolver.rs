use std::path::{Path, PathBuf};

use crate::domain::Language;

/// Maps an import string appearing in `source_file` to a concrete file under
/// `project_root`. Implementations must gate every result through
/// `paths::contains`; anything outside the root resolves to `None`.
pub trait ImportResolver: Send + Sync {
    fn handles(&self, language: Language) -> bool;

    fn resolve(
        &self,
        import: &str,
        source_file: &Path,
        project_root: &Path,
    ) -> Option<PathBuf>;
}
