use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use duckdb::{params, Connection};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::DomainError;

/// Content-hash -> vector cache with LRU-by-last-access pruning.
///
/// Vectors are stored as JSON arrays; anything else in the blob column is a
/// legacy format and gets evicted on read.
pub struct EmbeddingCache {
    conn: Arc<Mutex<Connection>>,
}

/// Cache key for a text: truncated SHA-256.
pub fn text_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{digest:x}")[..32].to_string()
}

/// Timestamps are written from here in UTC so pruning windows are not at
/// the mercy of the database session timezone.
fn now_utc() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

impl EmbeddingCache {
    pub fn new(store_root: &Path) -> Result<Self, DomainError> {
        let cache_dir = store_root.join("cache");
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| DomainError::storage(format!("Failed to create cache dir: {e}")))?;
        let conn = Connection::open(cache_dir.join("embeddings.duckdb"))
            .map_err(|e| DomainError::storage(format!("Failed to open embedding cache: {e}")))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DomainError::storage(format!("Failed to open in-memory cache: {e}")))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
                hash TEXT PRIMARY KEY,
                vector TEXT NOT NULL,
                last_accessed TIMESTAMP NOT NULL
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize cache schema: {e}")))?;
        Ok(())
    }

    /// Returns the cached vector and refreshes its access time. A stored
    /// value that is not a JSON array is evicted and treated as a miss.
    pub async fn get(&self, hash: &str) -> Result<Option<Vec<f32>>, DomainError> {
        let conn = self.conn.lock().await;

        let raw: Option<String> = conn
            .query_row(
                "SELECT vector FROM embeddings WHERE hash = ?",
                params![hash],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                duckdb::Error::QueryReturnedNoRows => Ok(None),
                other => Err(DomainError::storage(format!("Cache read failed: {other}"))),
            })?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        if !raw.trim_start().starts_with('[') {
            conn.execute("DELETE FROM embeddings WHERE hash = ?", params![hash])
                .map_err(|e| DomainError::storage(format!("Cache evict failed: {e}")))?;
            debug!("Evicted legacy cache entry {hash}");
            return Ok(None);
        }

        let vector: Vec<f32> = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(_) => {
                conn.execute("DELETE FROM embeddings WHERE hash = ?", params![hash])
                    .map_err(|e| DomainError::storage(format!("Cache evict failed: {e}")))?;
                debug!("Evicted unreadable cache entry {hash}");
                return Ok(None);
            }
        };

        conn.execute(
            "UPDATE embeddings SET last_accessed = CAST(? AS TIMESTAMP) WHERE hash = ?",
            params![now_utc(), hash],
        )
        .map_err(|e| DomainError::storage(format!("Cache touch failed: {e}")))?;

        Ok(Some(vector))
    }

    pub async fn set(&self, hash: &str, vector: &[f32]) -> Result<(), DomainError> {
        let encoded = serde_json::to_string(vector)
            .map_err(|e| DomainError::internal(format!("Failed to encode vector: {e}")))?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO embeddings (hash, vector, last_accessed) \
             VALUES (?, ?, CAST(? AS TIMESTAMP))",
            params![hash, encoded, now_utc()],
        )
        .map_err(|e| DomainError::storage(format!("Cache write failed: {e}")))?;
        Ok(())
    }

    /// Deletes entries not accessed within the last `days` days.
    pub async fn prune(&self, days: i64) -> Result<u64, DomainError> {
        let cutoff = (Utc::now() - Duration::days(days))
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string();
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute(
                "DELETE FROM embeddings WHERE last_accessed < CAST(? AS TIMESTAMP)",
                params![cutoff],
            )
            .map_err(|e| DomainError::storage(format!("Cache prune failed: {e}")))?;
        debug!("Pruned {deleted} cache entries older than {days} days");
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let cache = EmbeddingCache::in_memory().unwrap();
        let hash = text_hash("def foo(): pass");

        cache.set(&hash, &[0.1, 0.2, 0.3]).await.unwrap();
        let got = cache.get(&hash).await.unwrap().unwrap();
        assert_eq!(got, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let cache = EmbeddingCache::in_memory().unwrap();
        assert!(cache.get(&text_hash("nothing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_zero_days_clears_everything() {
        let cache = EmbeddingCache::in_memory().unwrap();
        let hash = text_hash("x");
        cache.set(&hash, &[1.0]).await.unwrap();

        cache.prune(0).await.unwrap();
        assert!(cache.get(&hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_keeps_recent_entries() {
        let cache = EmbeddingCache::in_memory().unwrap();
        let hash = text_hash("y");
        cache.set(&hash, &[1.0]).await.unwrap();

        cache.prune(30).await.unwrap();
        assert!(cache.get(&hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_legacy_blob_evicted_on_read() {
        let cache = EmbeddingCache::in_memory().unwrap();
        {
            let conn = cache.conn.lock().await;
            conn.execute(
                "INSERT INTO embeddings (hash, vector, last_accessed) \
                 VALUES (?, ?, CAST(? AS TIMESTAMP))",
                params!["legacy", "\u{1}\u{2}binary-garbage", now_utc()],
            )
            .unwrap();
        }
        assert!(cache.get("legacy").await.unwrap().is_none());
        // A second read stays a miss: the row is gone.
        assert!(cache.get("legacy").await.unwrap().is_none());
    }

    #[test]
    fn test_text_hash_truncated() {
        let h = text_hash("abc");
        assert_eq!(h.len(), 32);
        assert_eq!(h, text_hash("abc"));
        assert_ne!(h, text_hash("abd"));
    }
}
