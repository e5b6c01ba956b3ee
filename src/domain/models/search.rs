use serde::{Deserialize, Serialize};

use super::Chunk;

/// Server-side bounds on the number of results a single search may return.
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 100;

/// A hybrid search request against one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    query: String,
    limit: usize,
    include: Option<String>,
    exclude: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 10,
            include: None,
            exclude: None,
        }
    }

    /// Clamps to `[MIN_LIMIT, MAX_LIMIT]`.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(MIN_LIMIT, MAX_LIMIT);
        self
    }

    pub fn with_include(mut self, glob: impl Into<String>) -> Self {
        self.include = Some(glob.into());
        self
    }

    pub fn with_exclude(mut self, glob: impl Into<String>) -> Self {
        self.exclude = Some(glob.into());
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn include(&self) -> Option<&str> {
        self.include.as_deref()
    }

    pub fn exclude(&self) -> Option<&str> {
        self.exclude.as_deref()
    }

    pub fn has_scope_filter(&self) -> bool {
        self.include.is_some() || self.exclude.is_some()
    }
}

/// One scored chunk returned from retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    chunk: Chunk,
    score: f32,
}

impl SearchHit {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn into_chunk(self) -> Chunk {
        self.chunk
    }

    pub fn score(&self) -> f32 {
        self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_clamped_to_range() {
        assert_eq!(SearchRequest::new("q").with_limit(0).limit(), 1);
        assert_eq!(SearchRequest::new("q").with_limit(10).limit(), 10);
        assert_eq!(SearchRequest::new("q").with_limit(5000).limit(), 100);
    }

    #[test]
    fn test_scope_filter_detection() {
        let plain = SearchRequest::new("auth");
        assert!(!plain.has_scope_filter());

        let scoped = SearchRequest::new("auth").with_exclude("tests/**");
        assert!(scoped.has_scope_filter());
    }
}
