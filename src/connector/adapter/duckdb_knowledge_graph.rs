use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::KnowledgeGraph;
use crate::domain::{Confidence, DomainError, Edge, EdgeKind};

/// Single `edges` table shared by all projects, scoped by the `project`
/// column. One persistent connection per process.
pub struct DuckdbKnowledgeGraph {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbKnowledgeGraph {
    pub fn new(store_root: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(store_root.join("kg.duckdb"))
            .map_err(|e| DomainError::storage(format!("Failed to open knowledge graph: {e}")))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DomainError::storage(format!("Failed to open in-memory graph: {e}")))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS edges (
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                confidence TEXT NOT NULL,
                project TEXT NOT NULL,
                source_file TEXT NOT NULL,
                PRIMARY KEY (project, source_id, target_id, kind)
            );

            -- Incoming-edge lookups (find_references)
            CREATE INDEX IF NOT EXISTS idx_edges_target
            ON edges(project, target_id);

            -- Per-file clearing during incremental passes
            CREATE INDEX IF NOT EXISTS idx_edges_source_file
            ON edges(project, source_file);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize edges schema: {e}")))?;

        debug!("Knowledge graph edges table initialized");
        Ok(())
    }

    fn row_to_edge(row: &Row) -> duckdb::Result<Edge> {
        Ok(Edge::new(
            row.get::<_, String>(4)?,
            row.get::<_, String>(0)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(1)?,
            EdgeKind::parse(&row.get::<_, String>(2)?),
            Confidence::parse(&row.get::<_, String>(3)?),
        ))
    }

    async fn query_edges(
        &self,
        sql: &str,
        project: &str,
        chunk_id: &str,
    ) -> Result<Vec<Edge>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare edge query: {e}")))?;
        let rows = stmt
            .query_map(params![project, chunk_id], Self::row_to_edge)
            .map_err(|e| DomainError::storage(format!("Failed to query edges: {e}")))?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row.map_err(|e| DomainError::storage(format!("Failed to read edge: {e}")))?);
        }
        Ok(edges)
    }
}

#[async_trait]
impl KnowledgeGraph for DuckdbKnowledgeGraph {
    async fn add_edges(&self, edges: &[Edge]) -> Result<(), DomainError> {
        if edges.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    r#"INSERT INTO edges
                        (source_id, target_id, kind, confidence, project, source_file)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT (project, source_id, target_id, kind) DO UPDATE SET
                        confidence = excluded.confidence,
                        source_file = excluded.source_file
                    "#,
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare edge insert: {e}")))?;

            for edge in edges {
                stmt.execute(params![
                    edge.source_id(),
                    edge.target_id(),
                    edge.kind().as_str(),
                    edge.confidence().as_str(),
                    edge.project(),
                    edge.source_file(),
                ])
                .map_err(|e| DomainError::storage(format!("Failed to save edge: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {e}")))?;

        debug!("Saved {} edges", edges.len());
        Ok(())
    }

    async fn edges_from(
        &self,
        project: &str,
        source_id: &str,
    ) -> Result<Vec<Edge>, DomainError> {
        self.query_edges(
            "SELECT source_id, target_id, kind, confidence, project, source_file \
             FROM edges WHERE project = ? AND source_id = ? \
             ORDER BY target_id, kind",
            project,
            source_id,
        )
        .await
    }

    async fn edges_to(
        &self,
        project: &str,
        target_id: &str,
    ) -> Result<Vec<Edge>, DomainError> {
        self.query_edges(
            "SELECT source_id, target_id, kind, confidence, project, source_file \
             FROM edges WHERE project = ? AND target_id = ? \
             ORDER BY source_id, kind",
            project,
            target_id,
        )
        .await
    }

    async fn clear_project(&self, project: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM edges WHERE project = ?", params![project])
            .map_err(|e| DomainError::storage(format!("Failed to clear project edges: {e}")))?;
        debug!("Cleared all edges for project {project}");
        Ok(())
    }

    async fn clear_source_files(
        &self,
        project: &str,
        filenames: &[String],
    ) -> Result<(), DomainError> {
        if filenames.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {e}")))?;
        {
            let mut stmt = tx
                .prepare("DELETE FROM edges WHERE project = ? AND source_file = ?")
                .map_err(|e| DomainError::storage(format!("Failed to prepare clear: {e}")))?;
            for filename in filenames {
                stmt.execute(params![project, filename])
                    .map_err(|e| DomainError::storage(format!("Failed to clear edges: {e}")))?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(project: &str, src: &str, file: &str, tgt: &str, kind: EdgeKind) -> Edge {
        Edge::new(project, src, file, tgt, kind, Confidence::Structural)
    }

    #[tokio::test]
    async fn test_add_and_query_edges() {
        let graph = DuckdbKnowledgeGraph::in_memory().unwrap();
        graph
            .add_edges(&[
                edge("p1", "src1", "b.py", "tgt1", EdgeKind::Call),
                edge("p1", "src2", "c.py", "tgt1", EdgeKind::Reference),
            ])
            .await
            .unwrap();

        let incoming = graph.edges_to("p1", "tgt1").await.unwrap();
        assert_eq!(incoming.len(), 2);

        let outgoing = graph.edges_from("p1", "src1").await.unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].kind(), EdgeKind::Call);
    }

    #[tokio::test]
    async fn test_projects_are_isolated() {
        let graph = DuckdbKnowledgeGraph::in_memory().unwrap();
        graph
            .add_edges(&[
                edge("p1", "s", "a.py", "t", EdgeKind::Call),
                edge("p2", "s", "a.py", "t", EdgeKind::Call),
            ])
            .await
            .unwrap();

        graph.clear_project("p1").await.unwrap();

        assert!(graph.edges_to("p1", "t").await.unwrap().is_empty());
        assert_eq!(graph.edges_to("p2", "t").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_source_files_scopes_to_file() {
        let graph = DuckdbKnowledgeGraph::in_memory().unwrap();
        graph
            .add_edges(&[
                edge("p1", "s1", "b.py", "t", EdgeKind::Call),
                edge("p1", "s2", "c.py", "t", EdgeKind::Call),
            ])
            .await
            .unwrap();

        graph
            .clear_source_files("p1", &["b.py".to_string()])
            .await
            .unwrap();

        let remaining = graph.edges_to("p1", "t").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].source_file(), "c.py");
    }

    #[tokio::test]
    async fn test_upsert_replaces_confidence() {
        let graph = DuckdbKnowledgeGraph::in_memory().unwrap();
        graph
            .add_edges(&[Edge::new(
                "p1",
                "s",
                "a.py",
                "t",
                EdgeKind::Call,
                Confidence::NameMatch,
            )])
            .await
            .unwrap();
        graph
            .add_edges(&[Edge::new(
                "p1",
                "s",
                "a.py",
                "t",
                EdgeKind::Call,
                Confidence::Structural,
            )])
            .await
            .unwrap();

        let edges = graph.edges_to("p1", "t").await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].confidence(), Confidence::Structural);
    }
}
