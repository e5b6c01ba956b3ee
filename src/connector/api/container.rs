use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::application::{EmbeddingService, GitMetaService, KnowledgeGraph, VectorStore};
use crate::config::Config;
use crate::connector::adapter::resolver::default_resolvers;
use crate::{
    DeleteProjectUseCase, DuckdbKnowledgeGraph, DuckdbVectorStore, EmbeddingCache,
    FindDefinitionUseCase, FindReferencesUseCase, GitSubprocessMeta, HttpEmbedding,
    MockEmbedding, ProjectStatsUseCase, RefreshIndexUseCase, SearchCodeUseCase,
    TreeSitterParser,
};

/// Explicit wiring of the whole stack: parser, embedder, stores, linker and
/// retrieval use cases. All per-project state lives behind the stores,
/// keyed by project id; the container itself is immutable after build.
pub struct Container {
    config: Config,
    cache: Arc<EmbeddingCache>,
    refresh_index: Arc<RefreshIndexUseCase>,
    search_code: Arc<SearchCodeUseCase>,
    find_definition: Arc<FindDefinitionUseCase>,
    find_references: Arc<FindReferencesUseCase>,
    project_stats: Arc<ProjectStatsUseCase>,
    delete_project: Arc<DeleteProjectUseCase>,
}

impl Container {
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.storage_root)?;

        let parser = Arc::new(TreeSitterParser::new());
        let cache = Arc::new(EmbeddingCache::new(&config.storage_root)?);

        let embedding_service: Arc<dyn EmbeddingService> = if config.mock_embeddings {
            debug!("Using mock embedding service");
            Arc::new(MockEmbedding::with_dimensions(config.dimensions))
        } else {
            debug!("Using HTTP embedding service at {}", config.embedding_endpoint);
            Arc::new(HttpEmbedding::new(&config, Arc::clone(&cache))?)
        };

        let vector_store: Arc<dyn VectorStore> = Arc::new(DuckdbVectorStore::new(
            &config.storage_root,
            config.dimensions,
        )?);
        let knowledge_graph: Arc<dyn KnowledgeGraph> =
            Arc::new(DuckdbKnowledgeGraph::new(&config.storage_root)?);
        let git_meta: Arc<dyn GitMetaService> =
            Arc::new(GitSubprocessMeta::new(config.git_concurrency));

        let refresh_index = Arc::new(RefreshIndexUseCase::new(
            Arc::clone(&parser) as _,
            Arc::clone(&embedding_service),
            Arc::clone(&vector_store),
            Arc::clone(&knowledge_graph),
            Arc::clone(&git_meta),
            default_resolvers(),
        ));
        let search_code = Arc::new(SearchCodeUseCase::new(
            Arc::clone(&vector_store),
            Arc::clone(&embedding_service),
        ));
        let find_definition = Arc::new(FindDefinitionUseCase::new(
            Arc::clone(&parser) as _,
            Arc::clone(&vector_store),
            Arc::clone(&knowledge_graph),
        ));
        let find_references = Arc::new(FindReferencesUseCase::new(
            Arc::clone(&vector_store),
            Arc::clone(&knowledge_graph),
        ));
        let project_stats = Arc::new(ProjectStatsUseCase::new(
            Arc::clone(&vector_store),
            Arc::clone(&git_meta),
            config.complexity_threshold,
            config.stale_days,
        ));
        let delete_project = Arc::new(DeleteProjectUseCase::new(
            Arc::clone(&vector_store),
            Arc::clone(&knowledge_graph),
        ));

        Ok(Self {
            config,
            cache,
            refresh_index,
            search_code,
            find_definition,
            find_references,
            project_stats,
            delete_project,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedding_cache(&self) -> Arc<EmbeddingCache> {
        Arc::clone(&self.cache)
    }

    pub fn refresh_index_use_case(&self) -> Arc<RefreshIndexUseCase> {
        Arc::clone(&self.refresh_index)
    }

    pub fn search_use_case(&self) -> Arc<SearchCodeUseCase> {
        Arc::clone(&self.search_code)
    }

    pub fn find_definition_use_case(&self) -> Arc<FindDefinitionUseCase> {
        Arc::clone(&self.find_definition)
    }

    pub fn find_references_use_case(&self) -> Arc<FindReferencesUseCase> {
        Arc::clone(&self.find_references)
    }

    pub fn project_stats_use_case(&self) -> Arc<ProjectStatsUseCase> {
        Arc::clone(&self.project_stats)
    }

    pub fn delete_project_use_case(&self) -> Arc<DeleteProjectUseCase> {
        Arc::clone(&self.delete_project)
    }
}
