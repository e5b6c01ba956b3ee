use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Language;

/// Derive the stable identifier of a chunk. The same `(filename,
/// symbol_name, start_line)` always hashes to the same id, so re-indexing an
/// unchanged file reproduces identical rows.
pub fn chunk_id(filename: &str, symbol_name: &str, start_line: u32) -> String {
    let digest = Sha256::digest(format!("{filename}:{symbol_name}:{start_line}").as_bytes());
    format!("{digest:x}")[..32].to_string()
}

/// SHA-256 of file bytes at ingest, used for the incremental skip.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{digest:x}")
}

/// The atomic semantic unit persisted in the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    id: String,
    filename: String,
    language: Language,
    symbol_name: String,
    symbol_kind: SymbolKind,
    start_line: u32,
    end_line: u32,
    content: String,
    signature: String,
    complexity: u32,
    dependencies: Vec<String>,
    author: Option<String>,
    last_modified: Option<String>,
    content_hash: String,
}

impl Chunk {
    pub fn new(
        filename: impl Into<String>,
        symbol_name: impl Into<String>,
        symbol_kind: SymbolKind,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
        language: Language,
    ) -> Self {
        let filename = filename.into();
        let symbol_name = symbol_name.into();
        let id = chunk_id(&filename, &symbol_name, start_line);
        Self {
            id,
            filename,
            language,
            symbol_name,
            symbol_kind,
            start_line,
            end_line,
            content: content.into(),
            signature: String::new(),
            complexity: 1,
            dependencies: Vec::new(),
            author: None,
            last_modified: None,
            content_hash: String::new(),
        }
    }

    /// Synthetic whole-file chunk for files with no extracted definitions.
    pub fn whole_file(
        filename: impl Into<String>,
        content: impl Into<String>,
        language: Language,
    ) -> Self {
        let filename = filename.into();
        let content = content.into();
        let end_line = content.lines().count().max(1) as u32;
        let symbol_name = format!("{filename}:1-{end_line}");
        Self::new(
            filename,
            symbol_name,
            SymbolKind::Chunk,
            1,
            end_line,
            content,
            language,
        )
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        filename: String,
        language: Language,
        symbol_name: String,
        symbol_kind: SymbolKind,
        start_line: u32,
        end_line: u32,
        content: String,
        signature: String,
        complexity: u32,
        dependencies: Vec<String>,
        author: Option<String>,
        last_modified: Option<String>,
        content_hash: String,
    ) -> Self {
        Self {
            id,
            filename,
            language,
            symbol_name,
            symbol_kind,
            start_line,
            end_line,
            content,
            signature,
            complexity,
            dependencies,
            author,
            last_modified,
            content_hash,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_complexity(mut self, complexity: u32) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = hash.into();
        self
    }

    pub fn with_git_meta(
        mut self,
        author: Option<String>,
        last_modified: Option<String>,
    ) -> Self {
        self.author = author;
        self.last_modified = last_modified;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn symbol_name(&self) -> &str {
        &self.symbol_name
    }

    pub fn symbol_kind(&self) -> SymbolKind {
        self.symbol_kind
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn complexity(&self) -> u32 {
        self.complexity
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.filename, self.start_line, self.end_line)
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.symbol_kind, SymbolKind::Function | SymbolKind::Method)
    }
}

/// What kind of declaration a chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Variable,
    Constant,
    MatchPath,
    DiagramNode,
    Chunk,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::MatchPath => "match_path",
            SymbolKind::DiagramNode => "diagram_node",
            SymbolKind::Chunk => "chunk",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => SymbolKind::Function,
            "class" => SymbolKind::Class,
            "method" => SymbolKind::Method,
            "variable" => SymbolKind::Variable,
            "constant" => SymbolKind::Constant,
            "match_path" => SymbolKind::MatchPath,
            "diagram_node" => SymbolKind::DiagramNode,
            _ => SymbolKind::Chunk,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_formula() {
        let id = chunk_id("src/auth.py", "verify_token", 12);
        let digest = Sha256::digest("src/auth.py:verify_token:12".as_bytes());
        assert_eq!(id, format!("{digest:x}")[..32]);
        assert_eq!(id.len(), 32);
    }

    #[test]
    fn test_chunk_id_stable_across_runs() {
        let a = chunk_id("a.py", "foo", 1);
        let b = chunk_id("a.py", "foo", 1);
        assert_eq!(a, b);
        assert_ne!(a, chunk_id("a.py", "foo", 2));
        assert_ne!(a, chunk_id("b.py", "foo", 1));
    }

    #[test]
    fn test_chunk_creation() {
        let chunk = Chunk::new(
            "src/auth.py",
            "verify_token",
            SymbolKind::Function,
            10,
            14,
            "def verify_token(token):\n    return decode(token)",
            Language::Python,
        )
        .with_signature("verify_token(token)")
        .with_complexity(1);

        assert_eq!(chunk.id(), chunk_id("src/auth.py", "verify_token", 10));
        assert_eq!(chunk.symbol_name(), "verify_token");
        assert_eq!(chunk.line_count(), 5);
        assert!(chunk.is_callable());
        assert!(chunk.contains_line(12));
        assert!(!chunk.contains_line(15));
    }

    #[test]
    fn test_whole_file_chunk_has_synthetic_name() {
        let chunk = Chunk::whole_file("notes.css", "body { color: red }\n", Language::Css);
        assert_eq!(chunk.symbol_name(), "notes.css:1-1");
        assert_eq!(chunk.symbol_kind(), SymbolKind::Chunk);
        assert!(!chunk.symbol_name().is_empty());
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash("fn main() {}"), content_hash("fn main() {}"));
        assert_ne!(content_hash("a"), content_hash("b"));
        assert_eq!(content_hash("x").len(), 64);
    }

    #[test]
    fn test_symbol_kind_roundtrip() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Class,
            SymbolKind::Method,
            SymbolKind::Variable,
            SymbolKind::Constant,
            SymbolKind::MatchPath,
            SymbolKind::DiagramNode,
            SymbolKind::Chunk,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), kind);
        }
    }
}
