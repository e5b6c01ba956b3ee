use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::{KnowledgeGraph, VectorStore};
use crate::domain::{Chunk, Confidence, DomainError, EdgeKind, Project};

/// Text-fallback fetch size when no structural edges exist.
const TEXT_FALLBACK_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceHit {
    pub chunk: Chunk,
    pub kind: EdgeKind,
    pub confidence: Confidence,
}

/// Who references a symbol: incoming graph edges on every chunk declaring
/// it, with a literal-text fallback marked `name_match`.
pub struct FindReferencesUseCase {
    vector_store: Arc<dyn VectorStore>,
    knowledge_graph: Arc<dyn KnowledgeGraph>,
}

impl FindReferencesUseCase {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        knowledge_graph: Arc<dyn KnowledgeGraph>,
    ) -> Self {
        Self {
            vector_store,
            knowledge_graph,
        }
    }

    pub async fn execute(
        &self,
        root: &str,
        symbol: &str,
    ) -> Result<Vec<ReferenceHit>, DomainError> {
        let project = Project::open(root)?;

        let definitions = self
            .vector_store
            .find_by_symbol(project.id(), symbol, None)
            .await?;
        let definition_ids: HashSet<&str> = definitions.iter().map(|c| c.id()).collect();

        let mut hits: Vec<ReferenceHit> = Vec::new();
        let mut seen: HashSet<(String, EdgeKind)> = HashSet::new();

        for definition in &definitions {
            let incoming = self
                .knowledge_graph
                .edges_to(project.id(), definition.id())
                .await?;
            for edge in incoming {
                if !seen.insert((edge.source_id().to_string(), edge.kind())) {
                    continue;
                }
                if let Some(source) = self
                    .vector_store
                    .get_by_id(project.id(), edge.source_id())
                    .await?
                {
                    hits.push(ReferenceHit {
                        chunk: source,
                        kind: edge.kind(),
                        confidence: edge.confidence(),
                    });
                }
            }
        }

        // No structural edges anywhere: fall back to literal text matches,
        // all tagged name_match.
        if hits.is_empty() {
            let text_hits = self
                .vector_store
                .find_containing_text(project.id(), symbol, TEXT_FALLBACK_LIMIT)
                .await?;
            for chunk in text_hits {
                if definition_ids.contains(chunk.id()) {
                    continue;
                }
                hits.push(ReferenceHit {
                    chunk,
                    kind: EdgeKind::Reference,
                    confidence: Confidence::NameMatch,
                });
            }
        }

        info!("Found {} references to {symbol}", hits.len());
        Ok(hits)
    }
}
