use std::path::Path;
use std::sync::OnceLock;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use regex::Regex;

use crate::domain::{DomainError, Language};

/// Directories never indexed, regardless of user globs.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
    "target",
    "build",
    "dist",
];

/// True when a project-relative path falls inside the default-ignore set:
/// a named ignore directory or any dot-directory.
pub fn is_default_ignored(rel_path: &str) -> bool {
    let segments: Vec<&str> = rel_path.split('/').filter(|s| !s.is_empty()).collect();
    for (i, segment) in segments.iter().enumerate() {
        if DEFAULT_IGNORES.contains(segment) {
            return true;
        }
        // Dot-directories only; a dotfile leaf is fine.
        if i + 1 < segments.len() && segment.starts_with('.') {
            return true;
        }
    }
    false
}

/// Include/exclude scope filter with gitignore-style glob semantics.
/// `exclude` wins over `include`; the default ignores always apply.
/// Patterns may be comma-separated.
pub struct ScopeFilter {
    include: Option<Gitignore>,
    exclude: Option<Gitignore>,
}

impl ScopeFilter {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self, DomainError> {
        Ok(Self {
            include: include.map(Self::build_matcher).transpose()?,
            exclude: exclude.map(Self::build_matcher).transpose()?,
        })
    }

    pub fn unfiltered() -> Self {
        Self {
            include: None,
            exclude: None,
        }
    }

    fn build_matcher(patterns: &str) -> Result<Gitignore, DomainError> {
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            builder
                .add_line(None, pattern)
                .map_err(|e| DomainError::invalid_input(format!("Bad glob '{pattern}': {e}")))?;
        }
        builder
            .build()
            .map_err(|e| DomainError::invalid_input(format!("Bad glob set: {e}")))
    }

    /// True iff `rel_path` survives the filter.
    pub fn matches(&self, rel_path: &str) -> bool {
        if is_default_ignored(rel_path) {
            return false;
        }
        let path = Path::new(rel_path);
        if let Some(exclude) = &self.exclude {
            if exclude.matched_path_or_any_parents(path, false).is_ignore() {
                return false;
            }
        }
        if let Some(include) = &self.include {
            return include.matched_path_or_any_parents(path, false).is_ignore();
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }
}

/// Per-path retrieval rank; lower wins. Source trees first, then plain
/// files, then tests, then docs. The ordering is stable by construction.
pub fn file_priority(rel_path: &str) -> u8 {
    if rel_path.ends_with(".md") || rel_path.ends_with(".markdown") {
        return 5;
    }
    if is_test_path(rel_path) {
        return 3;
    }
    let first = rel_path.split('/').next().unwrap_or("");
    if matches!(first, "src" | "lib" | "app") {
        return 0;
    }
    1
}

/// Heuristic test detection over path segments and filename shape.
pub fn is_test_path(rel_path: &str) -> bool {
    let segments: Vec<&str> = rel_path.split('/').collect();
    if segments
        .iter()
        .any(|s| matches!(*s, "test" | "tests" | "__tests__" | "spec" | "specs"))
    {
        return true;
    }
    let basename = segments.last().copied().unwrap_or("");
    let stem = basename.split('.').next().unwrap_or("");
    basename.contains(".test.")
        || basename.contains(".spec.")
        || stem.starts_with("test_")
        || stem.ends_with("_test")
}

/// True when some indexed file looks like the test for `filename`.
pub fn has_sibling_test(filename: &str, all_files: &[String]) -> bool {
    let basename = filename.rsplit('/').next().unwrap_or(filename);
    let stem = basename.split('.').next().unwrap_or(basename);
    if stem.is_empty() {
        return false;
    }
    all_files
        .iter()
        .any(|f| f != filename && is_test_path(f) && f.contains(stem))
}

fn keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{3,}\b|\b[A-Za-z]{6,}\b").expect("keyword regex"))
}

/// Up to three distinct keywords worth a literal-text lookup: acronyms of
/// three-plus capitals, or words of six-plus letters.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in keyword_regex().find_iter(query) {
        let word = m.as_str().to_string();
        if !seen.iter().any(|s: &String| s.eq_ignore_ascii_case(&word)) {
            seen.push(word);
            if seen.len() == 3 {
                break;
            }
        }
    }
    seen
}

/// Guess which source language a query is about, from explicit language
/// names or extension mentions. Used only as a rerank signal.
pub fn infer_query_language(query: &str) -> Option<Language> {
    let lower = query.to_lowercase();
    for lang in Language::all_supported() {
        if lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|tok| tok == lang.as_str())
        {
            return Some(lang);
        }
    }
    for (ext, lang) in [
        (".py", Language::Python),
        (".ts", Language::TypeScript),
        (".js", Language::JavaScript),
        (".rs", Language::Rust),
        (".go", Language::Go),
        (".dart", Language::Dart),
        (".java", Language::Java),
        (".cpp", Language::Cpp),
    ] {
        if lower.contains(ext) {
            return Some(lang);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ignores_always_apply() {
        assert!(is_default_ignored("node_modules/react/index.js"));
        assert!(is_default_ignored("src/__pycache__/a.pyc"));
        assert!(is_default_ignored(".github/workflows/ci.yml"));
        assert!(!is_default_ignored("src/auth.py"));
        // Dotfile leaf is not a dot-directory.
        assert!(!is_default_ignored("src/.env"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = ScopeFilter::new(Some("**/*.py"), Some("tests/**")).unwrap();
        assert!(filter.matches("src/auth.py"));
        assert!(!filter.matches("tests/test_auth.py"));
        assert!(!filter.matches("src/readme.txt"));
    }

    #[test]
    fn test_leading_slash_anchors_to_root() {
        let filter = ScopeFilter::new(None, Some("/build.py")).unwrap();
        assert!(!filter.matches("build.py"));
        assert!(filter.matches("tools/build.py"));
    }

    #[test]
    fn test_double_star_spans_segments() {
        let filter = ScopeFilter::new(Some("src/**/*.ts"), None).unwrap();
        assert!(filter.matches("src/deep/nested/mod.ts"));
        assert!(!filter.matches("docs/a.ts"));
    }

    #[test]
    fn test_file_priority_ordering() {
        assert!(file_priority("src/auth.py") < file_priority("scripts/auth.py"));
        assert!(file_priority("scripts/auth.py") < file_priority("tests/test_auth.py"));
        assert!(file_priority("tests/test_auth.py") < file_priority("docs/auth.md"));
    }

    #[test]
    fn test_keyword_extraction() {
        assert_eq!(
            extract_keywords("JWT authentication middleware"),
            vec!["JWT", "authentication", "middleware"]
        );
        // Short lowercase words don't qualify.
        assert!(extract_keywords("do it now").is_empty());
        // Capped at three.
        assert_eq!(
            extract_keywords("database migration runner scheduler worker").len(),
            3
        );
    }

    #[test]
    fn test_query_language_inference() {
        assert_eq!(
            infer_query_language("python token validation"),
            Some(Language::Python)
        );
        assert_eq!(
            infer_query_language("where is main.rs entry"),
            Some(Language::Rust)
        );
        assert_eq!(infer_query_language("token validation"), None);
    }

    #[test]
    fn test_sibling_test_detection() {
        let files = vec![
            "src/auth.py".to_string(),
            "tests/test_auth.py".to_string(),
            "src/db.py".to_string(),
        ];
        assert!(has_sibling_test("src/auth.py", &files));
        assert!(!has_sibling_test("src/db.py", &files));
    }
}
