use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, Embedding, SearchHit};

/// Raw per-project aggregates pulled in one pass; the stats use case layers
/// git and test-sibling analysis on top.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_chunks: u64,
    pub total_files: u64,
    /// language tag -> (file count, chunk count)
    pub languages: HashMap<String, (u64, u64)>,
    /// import string -> number of chunks declaring it, most imported first
    pub dependency_hubs: Vec<(String, u64)>,
    /// every indexed filename, for sibling-test detection
    pub filenames: Vec<String>,
    /// chunks at or above the complexity threshold
    pub high_complexity: Vec<Chunk>,
    /// filename -> last_modified (ISO-8601), where git metadata is present
    pub last_modified: HashMap<String, String>,
}

/// Per-project chunk table with a dense vector column.
///
/// Reads against a project that was never indexed return empty results and
/// must not create tables as a side effect.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Deletes any existing rows whose `filename` appears among the input
    /// chunks, then inserts, all in one transaction per call.
    async fn upsert_chunks(
        &self,
        project: &str,
        chunks: &[Chunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError>;

    /// Nearest chunks by cosine distance, best first.
    async fn search(
        &self,
        project: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, DomainError>;

    async fn find_by_symbol(
        &self,
        project: &str,
        name: &str,
        filename: Option<&str>,
    ) -> Result<Vec<Chunk>, DomainError>;

    /// All chunks of one file, ordered by start line.
    async fn find_by_file(
        &self,
        project: &str,
        filename: &str,
    ) -> Result<Vec<Chunk>, DomainError>;

    /// Substring match over chunk content, LIKE-escaped.
    async fn find_containing_text(
        &self,
        project: &str,
        literal: &str,
        limit: usize,
    ) -> Result<Vec<Chunk>, DomainError>;

    async fn get_by_id(
        &self,
        project: &str,
        chunk_id: &str,
    ) -> Result<Option<Chunk>, DomainError>;

    /// filename -> content hash, for the incremental skip.
    async fn file_hashes(&self, project: &str)
        -> Result<HashMap<String, String>, DomainError>;

    async fn delete_files(
        &self,
        project: &str,
        filenames: &[String],
    ) -> Result<u64, DomainError>;

    async fn delete_project(&self, project: &str) -> Result<(), DomainError>;

    async fn update_git_meta(
        &self,
        project: &str,
        filename: &str,
        author: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<(), DomainError>;

    async fn stats(&self, project: &str, complexity_threshold: u32)
        -> Result<StoreStats, DomainError>;
}
