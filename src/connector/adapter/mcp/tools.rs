use serde::Serialize;

use crate::application::{DefinitionCandidate, ReferenceHit};
use crate::domain::SearchHit;

/// One search result as emitted over the wire.
#[derive(Debug, Serialize)]
pub struct SearchResultOutput {
    pub filename: String,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_name: String,
    pub language: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub score: f32,
}

impl From<&SearchHit> for SearchResultOutput {
    fn from(hit: &SearchHit) -> Self {
        let chunk = hit.chunk();
        Self {
            filename: chunk.filename().to_string(),
            start_line: chunk.start_line(),
            end_line: chunk.end_line(),
            symbol_name: chunk.symbol_name().to_string(),
            language: chunk.language().to_string(),
            content: chunk.content().to_string(),
            author: chunk.author().map(String::from),
            last_modified: chunk.last_modified().map(String::from),
            score: hit.score(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DefinitionOutput {
    pub filename: String,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_name: String,
    pub symbol_kind: String,
    pub language: String,
    pub signature: String,
    pub content: String,
    pub confidence: String,
}

impl From<&DefinitionCandidate> for DefinitionOutput {
    fn from(candidate: &DefinitionCandidate) -> Self {
        let chunk = &candidate.chunk;
        Self {
            filename: chunk.filename().to_string(),
            start_line: chunk.start_line(),
            end_line: chunk.end_line(),
            symbol_name: chunk.symbol_name().to_string(),
            symbol_kind: chunk.symbol_kind().to_string(),
            language: chunk.language().to_string(),
            signature: chunk.signature().to_string(),
            content: chunk.content().to_string(),
            confidence: candidate.confidence.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReferenceOutput {
    pub filename: String,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_name: String,
    pub language: String,
    pub kind: String,
    pub confidence: String,
}

impl From<&ReferenceHit> for ReferenceOutput {
    fn from(hit: &ReferenceHit) -> Self {
        let chunk = &hit.chunk;
        Self {
            filename: chunk.filename().to_string(),
            start_line: chunk.start_line(),
            end_line: chunk.end_line(),
            symbol_name: chunk.symbol_name().to_string(),
            language: chunk.language().to_string(),
            kind: hit.kind.to_string(),
            confidence: hit.confidence.to_string(),
        }
    }
}
