use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::use_cases::scope::{self, ScopeFilter};
use crate::application::{EmbeddingService, VectorStore};
use crate::domain::{DomainError, Project, SearchHit, SearchRequest};

/// When a glob filter will discard candidates after the fact, fetch this
/// many times the requested limit from the store.
const SCOPE_FETCH_FACTOR: usize = 5;

/// Text matches per extracted keyword.
const KEYWORD_FETCH_LIMIT: usize = 10;

/// Score assigned to keyword-only matches. A chunk found by both legs keeps
/// its vector score.
const TEXT_MATCH_SCORE: f32 = 0.25;

/// Hybrid retrieval: dense vector similarity plus keyword fallback, then
/// glob post-filter and language/file-priority rerank.
pub struct SearchCodeUseCase {
    vector_store: Arc<dyn VectorStore>,
    embedding_service: Arc<dyn EmbeddingService>,
}

impl SearchCodeUseCase {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedding_service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            vector_store,
            embedding_service,
        }
    }

    pub async fn execute(
        &self,
        root: &str,
        request: SearchRequest,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let project = Project::open(root)?;
        let start_time = Instant::now();
        info!("Searching for: {}", request.query());

        let filter = ScopeFilter::new(request.include(), request.exclude())?;
        let fetch_limit = if request.has_scope_filter() {
            request.limit() * SCOPE_FETCH_FACTOR
        } else {
            request.limit()
        };

        let query_vector = self.embedding_service.embed_query(request.query()).await?;
        let vector_hits = self
            .vector_store
            .search(project.id(), &query_vector, fetch_limit)
            .await?;

        // Keyword leg: literal-text matches merged in, deduped by chunk id,
        // vector score preferred where both legs returned the chunk.
        let mut merged: HashMap<String, SearchHit> = vector_hits
            .into_iter()
            .map(|hit| (hit.chunk().id().to_string(), hit))
            .collect();

        for keyword in scope::extract_keywords(request.query()) {
            let text_hits = match self
                .vector_store
                .find_containing_text(project.id(), &keyword, KEYWORD_FETCH_LIMIT)
                .await
            {
                Ok(hits) => hits,
                Err(DomainError::FilterInjection(msg)) => {
                    // A keyword the sanitizer dislikes is just dropped.
                    debug!("Skipping keyword {keyword}: {msg}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            for chunk in text_hits {
                merged
                    .entry(chunk.id().to_string())
                    .or_insert_with(|| SearchHit::new(chunk, TEXT_MATCH_SCORE));
            }
        }

        let mut hits: Vec<SearchHit> = merged
            .into_values()
            .filter(|hit| filter.matches(hit.chunk().filename()))
            .collect();

        // Primary: chunk language matches the query's inferred language.
        // Secondary: file priority. Score orders within those bands.
        let query_language = scope::infer_query_language(request.query());
        hits.sort_by(|a, b| {
            let lang_a = Some(a.chunk().language()) == query_language;
            let lang_b = Some(b.chunk().language()) == query_language;
            lang_b
                .cmp(&lang_a)
                .then_with(|| {
                    scope::file_priority(a.chunk().filename())
                        .cmp(&scope::file_priority(b.chunk().filename()))
                })
                .then_with(|| {
                    b.score()
                        .partial_cmp(&a.score())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        hits.truncate(request.limit());

        let elapsed = start_time.elapsed();
        if hits.is_empty() {
            warn!("No results for query: {}", request.query());
        }
        info!("Found {} results in {:.2}s", hits.len(), elapsed.as_secs_f64());
        Ok(hits)
    }
}
