use serde::{Deserialize, Serialize};

/// A dense vector for one chunk, produced by the embedder and stored
/// alongside the chunk's scalar fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    chunk_id: String,
    vector: Vec<f32>,
    model: String,
}

impl Embedding {
    pub fn new(chunk_id: String, vector: Vec<f32>, model: String) -> Self {
        Self {
            chunk_id,
            vector,
            model,
        }
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    model_name: String,
    dimensions: usize,
}

impl EmbeddingConfig {
    pub fn new(model_name: String, dimensions: usize) -> Self {
        Self {
            model_name,
            dimensions,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_accessors() {
        let e = Embedding::new("c1".to_string(), vec![0.1, 0.2], "m".to_string());
        assert_eq!(e.chunk_id(), "c1");
        assert_eq!(e.dimensions(), 2);
        assert_eq!(e.model(), "m");
    }
}
