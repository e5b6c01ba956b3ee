use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::use_cases::scope;
use crate::application::{KnowledgeGraph, ParserService, VectorStore};
use crate::domain::{Chunk, Confidence, DomainError, Language, Project};

/// Upper bound on definition candidates returned.
const MAX_CANDIDATES: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionCandidate {
    pub chunk: Chunk,
    pub confidence: Confidence,
}

/// Resolves a symbol to its definition: the requesting usage's outgoing
/// graph edges first, then a project-wide name lookup.
pub struct FindDefinitionUseCase {
    parser: Arc<dyn ParserService>,
    vector_store: Arc<dyn VectorStore>,
    knowledge_graph: Arc<dyn KnowledgeGraph>,
}

impl FindDefinitionUseCase {
    pub fn new(
        parser: Arc<dyn ParserService>,
        vector_store: Arc<dyn VectorStore>,
        knowledge_graph: Arc<dyn KnowledgeGraph>,
    ) -> Self {
        Self {
            parser,
            vector_store,
            knowledge_graph,
        }
    }

    pub async fn execute(
        &self,
        root: &str,
        symbol: &str,
        filename: Option<&str>,
        line: Option<u32>,
    ) -> Result<Vec<DefinitionCandidate>, DomainError> {
        let project = Project::open(root)?;

        // Structural path: locate the chunk the request points into, follow
        // its outgoing edges to chunks declaring the symbol.
        if let (Some(filename), Some(line)) = (filename, line) {
            let structural = self
                .from_edges(&project, symbol, filename, line)
                .await
                .unwrap_or_else(|e| {
                    debug!("Structural definition lookup failed: {e}");
                    Vec::new()
                });
            if !structural.is_empty() {
                return Ok(structural);
            }
        }

        // Fallback: symbol-by-name across the project, reranked by query
        // language and file priority.
        let mut chunks = self
            .vector_store
            .find_by_symbol(project.id(), symbol, None)
            .await?;
        let request_language = filename.map(|f| Language::from_path(Path::new(f)));
        chunks.sort_by_key(|c| {
            (
                request_language.is_some_and(|l| c.language() != l),
                scope::file_priority(c.filename()),
                c.filename().to_string(),
                c.start_line(),
            )
        });
        chunks.truncate(MAX_CANDIDATES);

        Ok(chunks
            .into_iter()
            .map(|chunk| DefinitionCandidate {
                chunk,
                confidence: Confidence::NameMatch,
            })
            .collect())
    }

    async fn from_edges(
        &self,
        project: &Project,
        symbol: &str,
        filename: &str,
        line: u32,
    ) -> Result<Vec<DefinitionCandidate>, DomainError> {
        // Parse the live file to find the chunk containing the request
        // position; its id matches the stored rows when content is in sync.
        let path = project.root().join(filename);
        let content = tokio::fs::read_to_string(&path).await?;
        let language = Language::from_path(&path);
        let parsed = self.parser.parse_file(&content, filename, language).await?;

        let Some(containing) = parsed
            .chunks
            .iter()
            .filter(|c| c.contains_line(line))
            .min_by_key(|c| c.line_count())
        else {
            return Ok(Vec::new());
        };

        let edges = self
            .knowledge_graph
            .edges_from(project.id(), containing.id())
            .await?;

        let mut candidates = Vec::new();
        for edge in edges {
            if let Some(target) = self
                .vector_store
                .get_by_id(project.id(), edge.target_id())
                .await?
            {
                if target.symbol_name() == symbol {
                    candidates.push(DefinitionCandidate {
                        chunk: target,
                        confidence: edge.confidence(),
                    });
                }
            }
            if candidates.len() >= MAX_CANDIDATES {
                break;
            }
        }
        Ok(candidates)
    }
}
