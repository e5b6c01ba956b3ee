use std::sync::Arc;

use tracing::info;

use crate::application::{KnowledgeGraph, VectorStore};
use crate::domain::{DomainError, Project};

/// Drops a project's chunk table and clears its edges. The embedding cache
/// is left alone; it is keyed by content, not by project.
pub struct DeleteProjectUseCase {
    vector_store: Arc<dyn VectorStore>,
    knowledge_graph: Arc<dyn KnowledgeGraph>,
}

impl DeleteProjectUseCase {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        knowledge_graph: Arc<dyn KnowledgeGraph>,
    ) -> Self {
        Self {
            vector_store,
            knowledge_graph,
        }
    }

    pub async fn execute(&self, root: &str) -> Result<(), DomainError> {
        let project = Project::open(root)?;
        self.vector_store.delete_project(project.id()).await?;
        self.knowledge_graph.clear_project(project.id()).await?;
        info!("Deleted project {} ({})", root, project.id());
        Ok(())
    }
}
