use std::path::{Path, PathBuf};

use crate::application::ImportResolver;
use crate::domain::{paths, Language};

/// Python import resolution: relative imports ascend by dot count from the
/// source file's package directory; absolute imports search the project root
/// and a conventional `src/` head. Modules try `x.py` then `x/__init__.py`.
pub struct PythonResolver;

impl PythonResolver {
    fn module_candidate(base: &Path, dotted: &str, root: &Path) -> Option<PathBuf> {
        let segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();

        let candidate = if segments.is_empty() {
            base.join("__init__.py")
        } else {
            let mut rel = base.to_path_buf();
            for segment in &segments {
                rel = rel.join(segment);
            }
            let as_file = rel.with_extension("py");
            if as_file.is_file() {
                as_file
            } else {
                rel.join("__init__.py")
            }
        };

        if candidate.is_file() && paths::contains(root, &candidate) {
            Some(candidate)
        } else {
            None
        }
    }
}

impl ImportResolver for PythonResolver {
    fn handles(&self, language: Language) -> bool {
        language == Language::Python
    }

    fn resolve(
        &self,
        import: &str,
        source_file: &Path,
        project_root: &Path,
    ) -> Option<PathBuf> {
        if let Some(stripped) = import.strip_prefix('.') {
            // `from .a.b import c`: one dot stays in the package directory,
            // each further dot ascends one level.
            let extra_dots = stripped.chars().take_while(|c| *c == '.').count();
            let rest = &stripped[extra_dots..];

            let mut dir = source_file.parent()?.to_path_buf();
            for _ in 0..extra_dots {
                dir = dir.parent()?.to_path_buf();
            }
            return Self::module_candidate(&dir, rest, project_root);
        }

        for head in [project_root.to_path_buf(), project_root.join("src")] {
            if let Some(found) = Self::module_candidate(&head, import, project_root) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("pkg/sub")).unwrap();
        std::fs::write(root.join("a.py"), "def foo(): pass\n").unwrap();
        std::fs::write(root.join("pkg/__init__.py"), "").unwrap();
        std::fs::write(root.join("pkg/util.py"), "def helper(): pass\n").unwrap();
        std::fs::write(root.join("pkg/sub/__init__.py"), "").unwrap();
        std::fs::write(root.join("pkg/sub/deep.py"), "x = 1\n").unwrap();
        dir
    }

    #[test]
    fn test_absolute_import_resolves_module() {
        let dir = fixture();
        let root = dir.path();
        let resolver = PythonResolver;

        let found = resolver
            .resolve("a", &root.join("pkg/util.py"), root)
            .unwrap();
        assert_eq!(found.canonicalize().unwrap(), root.join("a.py").canonicalize().unwrap());
    }

    #[test]
    fn test_absolute_import_resolves_package_init() {
        let dir = fixture();
        let root = dir.path();
        let resolver = PythonResolver;

        let found = resolver.resolve("pkg", &root.join("a.py"), root).unwrap();
        assert!(found.ends_with("pkg/__init__.py"));
    }

    #[test]
    fn test_dotted_import_resolves_nested_module() {
        let dir = fixture();
        let root = dir.path();
        let resolver = PythonResolver;

        let found = resolver
            .resolve("pkg.sub.deep", &root.join("a.py"), root)
            .unwrap();
        assert!(found.ends_with("pkg/sub/deep.py"));
    }

    #[test]
    fn test_relative_import_same_package() {
        let dir = fixture();
        let root = dir.path();
        let resolver = PythonResolver;

        // from .util import helper (inside pkg/)
        let found = resolver
            .resolve(".util", &root.join("pkg/sub/deep.py"), root);
        // `.util` from pkg/sub/ looks in pkg/sub/, which has no util.
        assert!(found.is_none());

        let found = resolver
            .resolve(".util", &root.join("pkg/__init__.py"), root)
            .unwrap();
        assert!(found.ends_with("pkg/util.py"));
    }

    #[test]
    fn test_relative_import_ascends_per_extra_dot() {
        let dir = fixture();
        let root = dir.path();
        let resolver = PythonResolver;

        // from ..util import helper (inside pkg/sub/)
        let found = resolver
            .resolve("..util", &root.join("pkg/sub/deep.py"), root)
            .unwrap();
        assert!(found.ends_with("pkg/util.py"));
    }

    #[test]
    fn test_unresolvable_import_is_none() {
        let dir = fixture();
        let root = dir.path();
        let resolver = PythonResolver;
        assert!(resolver.resolve("requests", &root.join("a.py"), root).is_none());
    }

    #[test]
    fn test_out_of_root_rejected() {
        let dir = fixture();
        let root = dir.path().join("pkg");
        let resolver = PythonResolver;
        // `...a` from pkg/sub/deep.py lands at <tmp>/a.py, which exists but
        // sits outside the project root pkg/.
        assert!(resolver
            .resolve("...a", &root.join("sub/deep.py"), &root)
            .is_none());
    }
}
