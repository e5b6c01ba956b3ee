use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, Embedding, EmbeddingConfig};

/// Generates dense vectors for chunks and queries. Implementations must
/// return vectors in the same order as their inputs.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Embedding>, DomainError>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DomainError>;

    fn config(&self) -> &EmbeddingConfig;
}
