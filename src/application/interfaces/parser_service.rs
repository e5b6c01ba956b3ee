use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, Language, Usage};

/// Everything the parser extracts from one file: persisted chunks, transient
/// usages, and the file's declared import strings.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub chunks: Vec<Chunk>,
    pub usages: Vec<Usage>,
    pub dependencies: Vec<String>,
}

/// Splits file content into semantic chunks and name usages.
#[async_trait]
pub trait ParserService: Send + Sync {
    async fn parse_file(
        &self,
        content: &str,
        filename: &str,
        language: Language,
    ) -> Result<ParsedFile, DomainError>;

    fn supports_language(&self, language: Language) -> bool;
}
