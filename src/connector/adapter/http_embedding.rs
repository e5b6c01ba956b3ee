use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::application::EmbeddingService;
use crate::config::Config;
use crate::connector::adapter::embedding_cache::{text_hash, EmbeddingCache};
use crate::domain::{Chunk, DomainError, Embedding, EmbeddingConfig};

/// Texts per POST to the embedding endpoint.
const BATCH_SIZE: usize = 32;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedResponseItem>,
}

#[derive(Deserialize)]
struct EmbedResponseItem {
    embedding: Vec<f32>,
}

/// Batched text -> vector requests against an external OpenAI-compatible
/// endpoint, fronted by the on-disk cache and a global concurrency gate.
pub struct HttpEmbedding {
    client: reqwest::Client,
    endpoint: String,
    config: EmbeddingConfig,
    cache: Arc<EmbeddingCache>,
    semaphore: Arc<Semaphore>,
}

impl HttpEmbedding {
    pub fn new(config: &Config, cache: Arc<EmbeddingCache>) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.embed_timeout_secs))
            .build()
            .map_err(|e| DomainError::embedding(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.embedding_endpoint.clone(),
            config: EmbeddingConfig::new(config.embedding_model.clone(), config.dimensions),
            cache,
            semaphore: Arc::new(Semaphore::new(config.embed_concurrency)),
        })
    }

    /// Text fed to the model for a chunk: declared name, kind tag, body.
    fn prepare_text(chunk: &Chunk) -> String {
        format!(
            "{} [{}] {}",
            chunk.symbol_name(),
            chunk.symbol_kind(),
            chunk.content()
        )
    }

    async fn post_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| DomainError::embedding(format!("Embedding gate closed: {e}")))?;

        let request = EmbedRequest {
            model: self.config.model_name(),
            input: texts,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::embedding(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(DomainError::embedding(format!(
                "Embedding endpoint returned {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| DomainError::embedding(format!("Bad embedding response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(DomainError::embedding(format!(
                "Embedding count mismatch: sent {}, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        let dims = self.config.dimensions();
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for v in &vectors {
            if v.len() != dims {
                return Err(DomainError::embedding(format!(
                    "Embedding dimension mismatch: expected {dims}, got {}",
                    v.len()
                )));
            }
        }
        Ok(vectors)
    }

    /// Order-preserving embed of arbitrary texts, cache-first.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses: Vec<usize> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(&text_hash(text)).await? {
                Some(vector) if vector.len() == self.config.dimensions() => {
                    results[i] = Some(vector)
                }
                _ => misses.push(i),
            }
        }

        debug!(
            "Embedding {} texts ({} cached, {} misses)",
            texts.len(),
            texts.len() - misses.len(),
            misses.len()
        );

        for batch in misses.chunks(BATCH_SIZE) {
            let batch_texts: Vec<String> = batch.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.post_batch(&batch_texts).await?;
            for (&i, vector) in batch.iter().zip(vectors) {
                self.cache.set(&text_hash(&texts[i]), &vector).await?;
                results[i] = Some(vector);
            }
        }

        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| DomainError::embedding("Embedding batch left a gap"))
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbedding {
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Embedding>, DomainError> {
        let texts: Vec<String> = chunks.iter().map(Self::prepare_text).collect();
        let vectors = self.embed_texts(&texts).await?;
        Ok(chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                Embedding::new(
                    chunk.id().to_string(),
                    vector,
                    self.config.model_name().to_string(),
                )
            })
            .collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DomainError> {
        let vectors = self.embed_texts(&[query.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::embedding("Empty embedding response"))
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}
