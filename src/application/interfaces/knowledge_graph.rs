use async_trait::async_trait;

use crate::domain::{DomainError, Edge};

/// The persisted edge store. Edges are scoped by project; one project's
/// operations never touch another's rows.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    /// Upserts a batch in a single transaction (one call per file in the
    /// linking pass).
    async fn add_edges(&self, edges: &[Edge]) -> Result<(), DomainError>;

    async fn edges_from(
        &self,
        project: &str,
        source_id: &str,
    ) -> Result<Vec<Edge>, DomainError>;

    async fn edges_to(
        &self,
        project: &str,
        target_id: &str,
    ) -> Result<Vec<Edge>, DomainError>;

    async fn clear_project(&self, project: &str) -> Result<(), DomainError>;

    /// Deletes edges whose source chunk belongs to any of the given files.
    async fn clear_source_files(
        &self,
        project: &str,
        filenames: &[String],
    ) -> Result<(), DomainError>;
}
