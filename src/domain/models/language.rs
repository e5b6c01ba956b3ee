use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Java,
    Cpp,
    Dart,
    Sql,
    Html,
    Css,
    Firestore,
    Markdown,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "py" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "h" => Language::Cpp,
            "dart" => Language::Dart,
            "sql" => Language::Sql,
            "html" | "htm" => Language::Html,
            "css" => Language::Css,
            "rules" => Language::Firestore,
            "md" | "markdown" => Language::Markdown,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "python" => Language::Python,
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "go" => Language::Go,
            "rust" => Language::Rust,
            "java" => Language::Java,
            "cpp" => Language::Cpp,
            "dart" => Language::Dart,
            "sql" => Language::Sql,
            "html" => Language::Html,
            "css" => Language::Css,
            "firestore" => Language::Firestore,
            "markdown" => Language::Markdown,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::Dart => "dart",
            Language::Sql => "sql",
            Language::Html => "html",
            Language::Css => "css",
            Language::Firestore => "firestore",
            Language::Markdown => "markdown",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Language::Unknown)
    }

    /// Languages with a tree-sitter grammar; the rest are chunked by the
    /// text scanners.
    pub fn has_grammar(&self) -> bool {
        matches!(
            self,
            Language::Python
                | Language::JavaScript
                | Language::TypeScript
                | Language::Go
                | Language::Rust
                | Language::Java
                | Language::Cpp
                | Language::Dart
        )
    }

    pub fn all_supported() -> Vec<Language> {
        vec![
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Go,
            Language::Rust,
            Language::Java,
            Language::Cpp,
            Language::Dart,
            Language::Sql,
            Language::Html,
            Language::Css,
            Language::Firestore,
            Language::Markdown,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("dart"), Language::Dart);
        assert_eq!(Language::from_extension("rules"), Language::Firestore);
        assert_eq!(Language::from_extension("md"), Language::Markdown);
        assert_eq!(Language::from_extension("bin"), Language::Unknown);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path(Path::new("src/main.rs")), Language::Rust);
        assert_eq!(
            Language::from_path(Path::new("lib/widgets/login.dart")),
            Language::Dart
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        for lang in Language::all_supported() {
            assert_eq!(Language::parse(lang.as_str()), lang);
        }
    }

    #[test]
    fn test_grammar_coverage() {
        assert!(Language::Python.has_grammar());
        assert!(!Language::Sql.has_grammar());
        assert!(!Language::Markdown.has_grammar());
    }
}
