use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{StoreStats, VectorStore};
use crate::domain::{
    sanitize, Chunk, DomainError, Embedding, Language, SearchHit, SymbolKind,
};

/// One DuckDB file per project under `<store_root>/db/`, holding a single
/// chunk table `t_<project_id>` with scalar columns plus the dense vector.
pub struct DuckdbVectorStore {
    db_dir: PathBuf,
    dimensions: usize,
    connections: Mutex<HashMap<String, Arc<Mutex<Connection>>>>,
}

impl DuckdbVectorStore {
    pub fn new(store_root: &Path, dimensions: usize) -> Result<Self, DomainError> {
        let db_dir = store_root.join("db");
        std::fs::create_dir_all(&db_dir)
            .map_err(|e| DomainError::storage(format!("Failed to create db dir: {e}")))?;
        Ok(Self {
            db_dir,
            dimensions,
            connections: Mutex::new(HashMap::new()),
        })
    }

    fn table(project: &str) -> String {
        format!("t_{project}")
    }

    fn db_path(&self, project: &str) -> PathBuf {
        self.db_dir.join(format!("{project}.duckdb"))
    }

    fn open_connection(&self, project: &str) -> Result<Connection, DomainError> {
        let conn = Connection::open(self.db_path(project))
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {e}")))?;

        // The VSS extension only accelerates search (HNSW); cosine ordering
        // itself is a core function, so a failed install degrades to a
        // sequential scan instead of failing the store.
        let vss_ready = conn
            .execute_batch(
                "INSTALL vss; LOAD vss; SET hnsw_enable_experimental_persistence = true;",
            )
            .is_ok();

        let table = Self::table(project);
        let schema_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                language TEXT NOT NULL,
                symbol_name TEXT NOT NULL,
                symbol_kind TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                content TEXT NOT NULL,
                signature TEXT NOT NULL,
                complexity INTEGER NOT NULL,
                dependencies TEXT NOT NULL,
                author TEXT,
                last_modified TEXT,
                content_hash TEXT NOT NULL,
                vector FLOAT[{dim}]
            );

            CREATE INDEX IF NOT EXISTS "idx_{table}_symbol" ON "{table}" (symbol_name);
            CREATE INDEX IF NOT EXISTS "idx_{table}_filename" ON "{table}" (filename);
            "#,
            table = table,
            dim = self.dimensions,
        );
        conn.execute_batch(&schema_sql)
            .map_err(|e| DomainError::storage(format!("Failed to initialize project table: {e}")))?;

        if vss_ready {
            let hnsw = format!(
                "CREATE INDEX IF NOT EXISTS \"idx_{table}_hnsw\" ON \"{table}\" \
                 USING HNSW (vector) WITH (metric = 'cosine');"
            );
            if let Err(e) = conn.execute_batch(&hnsw) {
                debug!("HNSW index unavailable, searches will scan: {e}");
            }
        } else {
            debug!("VSS extension unavailable, searches will scan");
        }

        debug!("Opened vector store for project {project}");
        Ok(conn)
    }

    /// Open (creating if needed) the project database. Write paths only.
    async fn open_or_create(&self, project: &str) -> Result<Arc<Mutex<Connection>>, DomainError> {
        let mut connections = self.connections.lock().await;
        if let Some(conn) = connections.get(project) {
            return Ok(Arc::clone(conn));
        }
        let conn = Arc::new(Mutex::new(self.open_connection(project)?));
        connections.insert(project.to_string(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Read gate: never create tables on a read. A project that was never
    /// indexed yields `None` and the caller returns empty results.
    async fn open_or_none(
        &self,
        project: &str,
    ) -> Result<Option<Arc<Mutex<Connection>>>, DomainError> {
        {
            let connections = self.connections.lock().await;
            if let Some(conn) = connections.get(project) {
                return Ok(Some(Arc::clone(conn)));
            }
        }
        if !self.db_path(project).exists() {
            return Ok(None);
        }
        Ok(Some(self.open_or_create(project).await?))
    }

    fn vector_to_array_literal(&self, vector: &[f32]) -> Result<String, DomainError> {
        if vector.len() != self.dimensions {
            return Err(DomainError::invalid_input(format!(
                "Expected embedding dimension {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        let mut s = String::with_capacity(vector.len() * 8);
        s.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            s.push_str(&format!("{v}"));
        }
        s.push(']');
        s.push_str(&format!("::FLOAT[{}]", self.dimensions));
        Ok(s)
    }

    const CHUNK_COLUMNS: &'static str = "id, filename, language, symbol_name, symbol_kind, \
         start_line, end_line, content, signature, complexity, dependencies, \
         author, last_modified, content_hash";

    fn row_to_chunk(row: &Row) -> Result<Chunk, duckdb::Error> {
        let dependencies: Vec<String> =
            serde_json::from_str(&row.get::<_, String>(10)?).unwrap_or_default();
        Ok(Chunk::reconstitute(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            Language::parse(&row.get::<_, String>(2)?),
            row.get::<_, String>(3)?,
            SymbolKind::parse(&row.get::<_, String>(4)?),
            u32::try_from(row.get::<_, i64>(5)?).unwrap_or(0),
            u32::try_from(row.get::<_, i64>(6)?).unwrap_or(0),
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
            u32::try_from(row.get::<_, i64>(9)?).unwrap_or(1),
            dependencies,
            row.get::<_, Option<String>>(11)?,
            row.get::<_, Option<String>>(12)?,
            row.get::<_, String>(13)?,
        ))
    }

    fn collect_chunks(
        conn: &Connection,
        sql: &str,
        query_params: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<Chunk>, DomainError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare query: {e}")))?;
        let mut rows = stmt
            .query(query_params)
            .map_err(|e| DomainError::storage(format!("Failed to run query: {e}")))?;

        let mut chunks = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {e}")))?
        {
            let chunk = Self::row_to_chunk(row)
                .map_err(|e| DomainError::storage(format!("Failed to parse chunk row: {e}")))?;
            chunks.push(chunk);
        }
        Ok(chunks)
    }
}

#[async_trait]
impl VectorStore for DuckdbVectorStore {
    async fn upsert_chunks(
        &self,
        project: &str,
        chunks: &[Chunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError> {
        if chunks.is_empty() {
            return Ok(());
        }
        if chunks.len() != embeddings.len() {
            return Err(DomainError::invalid_input(
                "Chunk and embedding count mismatch".to_string(),
            ));
        }

        let table = Self::table(project);
        let conn = self.open_or_create(project).await?;
        let mut conn = conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {e}")))?;

        // Replace-by-filename: a re-indexed file drops all its old rows.
        let mut filenames: Vec<&str> = chunks.iter().map(|c| c.filename()).collect();
        filenames.sort_unstable();
        filenames.dedup();
        {
            let mut stmt = tx
                .prepare(&format!("DELETE FROM \"{table}\" WHERE filename = ?"))
                .map_err(|e| DomainError::storage(format!("Failed to prepare delete: {e}")))?;
            for filename in &filenames {
                stmt.execute(params![filename])
                    .map_err(|e| DomainError::storage(format!("Failed to delete rows: {e}")))?;
            }
        }

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            if chunk.id() != embedding.chunk_id() {
                return Err(DomainError::invalid_input(format!(
                    "Embedding order mismatch: chunk {} vs embedding {}",
                    chunk.id(),
                    embedding.chunk_id()
                )));
            }
            let array_lit = self.vector_to_array_literal(embedding.vector())?;
            let dependencies = serde_json::to_string(chunk.dependencies())
                .map_err(|e| DomainError::internal(format!("Failed to encode deps: {e}")))?;
            // The array literal is part of the SQL text because DuckDB's
            // FLOAT[n] type does not bind as a parameter; it is built from
            // our own floats, never from user input.
            let sql = format!(
                "INSERT OR REPLACE INTO \"{table}\" ({cols}, vector) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, {array_lit})",
                cols = Self::CHUNK_COLUMNS,
            );
            tx.execute(
                &sql,
                params![
                    chunk.id(),
                    chunk.filename(),
                    chunk.language().as_str(),
                    chunk.symbol_name(),
                    chunk.symbol_kind().as_str(),
                    chunk.start_line() as i64,
                    chunk.end_line() as i64,
                    chunk.content(),
                    chunk.signature(),
                    chunk.complexity() as i64,
                    dependencies,
                    chunk.author(),
                    chunk.last_modified(),
                    chunk.content_hash(),
                ],
            )
            .map_err(|e| {
                DomainError::storage(format!("Failed to insert chunk {}: {e}", chunk.id()))
            })?;
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {e}")))?;

        debug!("Upserted {} chunks into {}", chunks.len(), table);
        Ok(())
    }

    async fn search(
        &self,
        project: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let Some(conn) = self.open_or_none(project).await? else {
            return Ok(Vec::new());
        };
        let array_lit = self.vector_to_array_literal(query_vector)?;
        let table = Self::table(project);

        let sql = format!(
            "SELECT {cols}, 1.0 - array_cosine_distance(vector, {array_lit}) AS score \
             FROM \"{table}\" \
             WHERE vector IS NOT NULL \
             ORDER BY array_cosine_distance(vector, {array_lit}) \
             LIMIT ?",
            cols = Self::CHUNK_COLUMNS,
        );

        let conn = conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare search: {e}")))?;
        let mut rows = stmt
            .query(params![limit as i64])
            .map_err(|e| DomainError::storage(format!("Failed to run search: {e}")))?;

        let mut hits = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read search row: {e}")))?
        {
            let chunk = Self::row_to_chunk(row)
                .map_err(|e| DomainError::storage(format!("Failed to parse chunk row: {e}")))?;
            let score: f32 = row
                .get(14)
                .map_err(|e| DomainError::storage(format!("Failed to read score: {e}")))?;
            hits.push(SearchHit::new(chunk, score));
        }
        Ok(hits)
    }

    async fn find_by_symbol(
        &self,
        project: &str,
        name: &str,
        filename: Option<&str>,
    ) -> Result<Vec<Chunk>, DomainError> {
        let Some(conn) = self.open_or_none(project).await? else {
            return Ok(Vec::new());
        };
        let table = Self::table(project);
        let conn = conn.lock().await;

        match filename {
            Some(filename) => Self::collect_chunks(
                &conn,
                &format!(
                    "SELECT {cols} FROM \"{table}\" \
                     WHERE symbol_name = ? AND filename = ? \
                     ORDER BY start_line",
                    cols = Self::CHUNK_COLUMNS,
                ),
                &[&name, &filename],
            ),
            None => Self::collect_chunks(
                &conn,
                &format!(
                    "SELECT {cols} FROM \"{table}\" \
                     WHERE symbol_name = ? \
                     ORDER BY filename, start_line",
                    cols = Self::CHUNK_COLUMNS,
                ),
                &[&name],
            ),
        }
    }

    async fn find_by_file(
        &self,
        project: &str,
        filename: &str,
    ) -> Result<Vec<Chunk>, DomainError> {
        let Some(conn) = self.open_or_none(project).await? else {
            return Ok(Vec::new());
        };
        let table = Self::table(project);
        let conn = conn.lock().await;
        Self::collect_chunks(
            &conn,
            &format!(
                "SELECT {cols} FROM \"{table}\" \
                 WHERE filename = ? \
                 ORDER BY start_line",
                cols = Self::CHUNK_COLUMNS,
            ),
            &[&filename],
        )
    }

    async fn find_containing_text(
        &self,
        project: &str,
        literal: &str,
        limit: usize,
    ) -> Result<Vec<Chunk>, DomainError> {
        let Some(conn) = self.open_or_none(project).await? else {
            return Ok(Vec::new());
        };
        let table = Self::table(project);
        // The literal is interpolated into a LIKE pattern, so it goes
        // through the sanitizer, not a bind parameter.
        let safe = sanitize::sanitize_like(literal)?;
        let sql = format!(
            "SELECT {cols} FROM \"{table}\" \
             WHERE content LIKE '%{safe}%' ESCAPE '\\' \
             ORDER BY filename, start_line \
             LIMIT {limit}",
            cols = Self::CHUNK_COLUMNS,
        );

        let conn = conn.lock().await;
        Self::collect_chunks(&conn, &sql, &[])
    }

    async fn get_by_id(
        &self,
        project: &str,
        chunk_id: &str,
    ) -> Result<Option<Chunk>, DomainError> {
        let Some(conn) = self.open_or_none(project).await? else {
            return Ok(None);
        };
        let table = Self::table(project);
        let conn = conn.lock().await;
        let chunks = Self::collect_chunks(
            &conn,
            &format!(
                "SELECT {cols} FROM \"{table}\" WHERE id = ?",
                cols = Self::CHUNK_COLUMNS,
            ),
            &[&chunk_id],
        )?;
        Ok(chunks.into_iter().next())
    }

    async fn file_hashes(
        &self,
        project: &str,
    ) -> Result<HashMap<String, String>, DomainError> {
        let Some(conn) = self.open_or_none(project).await? else {
            return Ok(HashMap::new());
        };
        let table = Self::table(project);
        let conn = conn.lock().await;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT filename, MIN(content_hash) FROM \"{table}\" GROUP BY filename"
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare hash query: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| DomainError::storage(format!("Failed to query hashes: {e}")))?;

        let mut hashes = HashMap::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read hash row: {e}")))?
        {
            hashes.insert(
                row.get::<_, String>(0)
                    .map_err(|e| DomainError::storage(format!("Bad filename: {e}")))?,
                row.get::<_, String>(1)
                    .map_err(|e| DomainError::storage(format!("Bad hash: {e}")))?,
            );
        }
        Ok(hashes)
    }

    async fn delete_files(
        &self,
        project: &str,
        filenames: &[String],
    ) -> Result<u64, DomainError> {
        if filenames.is_empty() {
            return Ok(0);
        }
        let Some(conn) = self.open_or_none(project).await? else {
            return Ok(0);
        };
        let table = Self::table(project);
        let mut conn = conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {e}")))?;

        let mut deleted = 0u64;
        {
            let mut stmt = tx
                .prepare(&format!("DELETE FROM \"{table}\" WHERE filename = ?"))
                .map_err(|e| DomainError::storage(format!("Failed to prepare delete: {e}")))?;
            for filename in filenames {
                deleted += stmt
                    .execute(params![filename])
                    .map_err(|e| DomainError::storage(format!("Failed to delete file: {e}")))?
                    as u64;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {e}")))?;

        debug!("Deleted {deleted} chunks across {} files", filenames.len());
        Ok(deleted)
    }

    async fn delete_project(&self, project: &str) -> Result<(), DomainError> {
        let mut connections = self.connections.lock().await;
        connections.remove(project);
        let path = self.db_path(project);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| DomainError::storage(format!("Failed to remove project db: {e}")))?;
        }
        debug!("Deleted project store {project}");
        Ok(())
    }

    async fn update_git_meta(
        &self,
        project: &str,
        filename: &str,
        author: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<(), DomainError> {
        let Some(conn) = self.open_or_none(project).await? else {
            return Ok(());
        };
        let table = Self::table(project);
        let conn = conn.lock().await;
        conn.execute(
            &format!(
                "UPDATE \"{table}\" \
                 SET author = COALESCE(?, author), \
                     last_modified = COALESCE(?, last_modified) \
                 WHERE filename = ?"
            ),
            params![author, last_modified, filename],
        )
        .map_err(|e| DomainError::storage(format!("Failed to update git meta: {e}")))?;
        Ok(())
    }

    async fn stats(
        &self,
        project: &str,
        complexity_threshold: u32,
    ) -> Result<StoreStats, DomainError> {
        let Some(conn) = self.open_or_none(project).await? else {
            return Ok(StoreStats::default());
        };
        let table = Self::table(project);
        let conn = conn.lock().await;

        let mut stats = StoreStats::default();

        let (total_chunks, total_files): (i64, i64) = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*), COUNT(DISTINCT filename) FROM \"{table}\""
                ),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| DomainError::storage(format!("Failed to count chunks: {e}")))?;
        stats.total_chunks = total_chunks as u64;
        stats.total_files = total_files as u64;

        {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT language, COUNT(DISTINCT filename), COUNT(*) \
                     FROM \"{table}\" GROUP BY language"
                ))
                .map_err(|e| DomainError::storage(format!("Failed language breakdown: {e}")))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| DomainError::storage(format!("Failed language query: {e}")))?;
            while let Some(row) = rows
                .next()
                .map_err(|e| DomainError::storage(format!("Failed language row: {e}")))?
            {
                let lang: String = row.get(0).map_err(storage_err)?;
                let files: i64 = row.get(1).map_err(storage_err)?;
                let chunks: i64 = row.get(2).map_err(storage_err)?;
                stats.languages.insert(lang, (files as u64, chunks as u64));
            }
        }

        // Dependency hubs: each file stores one dependency list replicated
        // across its chunks, so count per distinct file.
        {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT filename, MIN(dependencies) FROM \"{table}\" GROUP BY filename"
                ))
                .map_err(|e| DomainError::storage(format!("Failed deps query: {e}")))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| DomainError::storage(format!("Failed deps rows: {e}")))?;
            let mut counts: HashMap<String, u64> = HashMap::new();
            while let Some(row) = rows.next().map_err(storage_err_db)? {
                let filename: String = row.get(0).map_err(storage_err)?;
                stats.filenames.push(filename);
                let raw: String = row.get(1).map_err(storage_err)?;
                let deps: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
                for dep in deps {
                    *counts.entry(dep).or_insert(0) += 1;
                }
            }
            let mut hubs: Vec<(String, u64)> = counts.into_iter().collect();
            hubs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            hubs.truncate(10);
            stats.dependency_hubs = hubs;
        }

        stats.high_complexity = Self::collect_chunks(
            &conn,
            &format!(
                "SELECT {cols} FROM \"{table}\" \
                 WHERE complexity >= ? \
                 ORDER BY complexity DESC LIMIT 20",
                cols = Self::CHUNK_COLUMNS,
            ),
            &[&(complexity_threshold as i64)],
        )?;

        {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT filename, MIN(last_modified) FROM \"{table}\" \
                     WHERE last_modified IS NOT NULL GROUP BY filename"
                ))
                .map_err(|e| DomainError::storage(format!("Failed modified query: {e}")))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| DomainError::storage(format!("Failed modified rows: {e}")))?;
            while let Some(row) = rows.next().map_err(storage_err_db)? {
                stats.last_modified.insert(
                    row.get::<_, String>(0).map_err(storage_err)?,
                    row.get::<_, String>(1).map_err(storage_err)?,
                );
            }
        }

        Ok(stats)
    }
}

fn storage_err(e: duckdb::Error) -> DomainError {
    DomainError::storage(format!("Failed to read column: {e}"))
}

fn storage_err_db(e: duckdb::Error) -> DomainError {
    DomainError::storage(format!("Failed to advance rows: {e}"))
}
