use std::path::PathBuf;

/// Runtime configuration, read once at startup from the environment.
///
/// `EMBEDDING_MODEL`, `EMBEDDING_ENDPOINT`, `STORAGE_ROOT`, and `LOG_LEVEL`
/// are the supported variables; everything else has fixed defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_root: PathBuf,
    pub embedding_model: String,
    pub embedding_endpoint: String,
    /// Vector dimension, fixed per store.
    pub dimensions: usize,
    /// Concurrent embedding batches in flight.
    pub embed_concurrency: usize,
    pub embed_timeout_secs: u64,
    /// Concurrent git subprocesses.
    pub git_concurrency: usize,
    /// Complexity at or above which a symbol is a high-risk candidate.
    pub complexity_threshold: u32,
    /// Days without modification after which a file counts as stale.
    pub stale_days: i64,
    /// Use the deterministic mock embedder instead of the HTTP endpoint.
    pub mock_embeddings: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let storage_root = std::env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("code-intel")
            });

        Self {
            storage_root,
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "nomic-embed-text".to_string()),
            embedding_endpoint: std::env::var("EMBEDDING_ENDPOINT")
                .unwrap_or_else(|_| "http://127.0.0.1:11434/v1/embeddings".to_string()),
            dimensions: 384,
            embed_concurrency: 5,
            embed_timeout_secs: 30,
            git_concurrency: 10,
            complexity_threshold: 10,
            stale_days: 30,
            mock_embeddings: false,
        }
    }

    pub fn with_storage_root(mut self, root: PathBuf) -> Self {
        self.storage_root = root;
        self
    }

    pub fn with_mock_embeddings(mut self, mock: bool) -> Self {
        self.mock_embeddings = mock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_env();
        assert_eq!(config.dimensions, 384);
        assert_eq!(config.embed_concurrency, 5);
        assert_eq!(config.git_concurrency, 10);
    }
}
