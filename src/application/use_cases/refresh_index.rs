use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::use_cases::scope::{self, ScopeFilter};
use crate::application::{
    EmbeddingService, GitMetaService, ImportResolver, KnowledgeGraph, ParsedFile,
    ParserService, VectorStore,
};
use crate::domain::{
    paths, Chunk, Confidence, DomainError, Edge, EdgeKind, Language, Project, Usage,
};

/// One per-file failure surfaced in the refresh summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFileError {
    pub file: String,
    pub kind: String,
    pub msg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub project: String,
    pub indexed: u64,
    pub skipped: u64,
    pub chunks: u64,
    pub elapsed_ms: u64,
    pub errors: Vec<IndexFileError>,
}

/// Orchestrates scan -> hash-compare -> parse -> embed -> upsert (Pass 1),
/// then usage linking (Pass 2), then async git enrichment. Pass 1 finishes
/// for every file before any of its edges are written, so every edge target
/// already exists at write time.
pub struct RefreshIndexUseCase {
    parser: Arc<dyn ParserService>,
    embedding_service: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    knowledge_graph: Arc<dyn KnowledgeGraph>,
    git_meta: Arc<dyn GitMetaService>,
    resolvers: Vec<Arc<dyn ImportResolver>>,
    /// Serializes index passes per project.
    project_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RefreshIndexUseCase {
    pub fn new(
        parser: Arc<dyn ParserService>,
        embedding_service: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        knowledge_graph: Arc<dyn KnowledgeGraph>,
        git_meta: Arc<dyn GitMetaService>,
        resolvers: Vec<Arc<dyn ImportResolver>>,
    ) -> Self {
        Self {
            parser,
            embedding_service,
            vector_store,
            knowledge_graph,
            git_meta,
            resolvers,
            project_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn project_lock(&self, project: &str) -> Arc<Mutex<()>> {
        let mut locks = self.project_locks.lock().await;
        Arc::clone(
            locks
                .entry(project.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    pub async fn execute(
        &self,
        root: &str,
        force_full: bool,
        include: Option<&str>,
        exclude: Option<&str>,
    ) -> Result<IndexReport, DomainError> {
        let project = Project::open(root)?;
        let lock = self.project_lock(project.id()).await;
        let _guard = lock.lock().await;

        let start_time = Instant::now();
        let filter = ScopeFilter::new(include, exclude)?;

        // Discover candidate files and hash their content.
        let current = self.discover(project.root(), &filter).await;
        info!(
            "Discovered {} indexable files under {}",
            current.len(),
            project.root().display()
        );

        let stored_hashes = self.vector_store.file_hashes(project.id()).await?;

        if force_full {
            self.knowledge_graph.clear_project(project.id()).await?;
        }

        // Files that disappeared lose their chunks and edges. With an
        // include filter the scan is partial, so deletions are skipped.
        if include.is_none() {
            let gone: Vec<String> = stored_hashes
                .keys()
                .filter(|f| !current.contains_key(*f) && filter.matches(f))
                .cloned()
                .collect();
            if !gone.is_empty() {
                debug!("Removing {} deleted files", gone.len());
                self.vector_store.delete_files(project.id(), &gone).await?;
                self.knowledge_graph
                    .clear_source_files(project.id(), &gone)
                    .await?;
            }
        }

        let mut to_index: Vec<&String> = current
            .keys()
            .filter(|f| {
                force_full
                    || stored_hashes.get(*f).map(String::as_str)
                        != Some(current[*f].1.as_str())
            })
            .collect();
        to_index.sort();
        let skipped = (current.len() - to_index.len()) as u64;

        let mut report = IndexReport {
            project: project.id().to_string(),
            indexed: 0,
            skipped,
            chunks: 0,
            elapsed_ms: 0,
            errors: Vec::new(),
        };

        // Pass 1: parse, embed, upsert. Parsed files are kept in memory so
        // Pass 2 never re-parses.
        let progress_bar = ProgressBar::new(to_index.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {bar:40.green/dim} {pos}/{len} {msg:.dim}")
                .expect("Invalid progress bar template")
                .progress_chars("━━─"),
        );

        let mut parsed_files: HashMap<String, ParsedFile> = HashMap::new();
        for filename in &to_index {
            progress_bar.set_message((*filename).clone());
            let (content, _) = &current[*filename];
            match self.index_file(project.id(), filename, content).await {
                Ok(parsed) => {
                    report.indexed += 1;
                    report.chunks += parsed.chunks.len() as u64;
                    parsed_files.insert((*filename).clone(), parsed);
                }
                Err(e) => {
                    warn!("Failed to index {filename}: {e}");
                    report.errors.push(IndexFileError {
                        file: (*filename).clone(),
                        kind: e.kind().to_string(),
                        msg: e.to_string(),
                    });
                }
            }
            progress_bar.inc(1);
        }
        progress_bar.finish_and_clear();

        // Pass 2: every usage becomes at most one edge, batched per file.
        for (filename, parsed) in &parsed_files {
            let edges = self
                .link_file(&project, filename, parsed)
                .await
                .unwrap_or_else(|e| {
                    warn!("Failed to link {filename}: {e}");
                    report.errors.push(IndexFileError {
                        file: filename.clone(),
                        kind: e.kind().to_string(),
                        msg: e.to_string(),
                    });
                    Vec::new()
                });
            if !edges.is_empty() {
                self.knowledge_graph.add_edges(&edges).await?;
            }
        }

        // Git enrichment, bounded and non-fatal.
        self.enrich_git_meta(&project, parsed_files.keys()).await;

        report.elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Index refresh complete: {} indexed, {} skipped, {} chunks, {} errors in {}ms",
            report.indexed,
            report.skipped,
            report.chunks,
            report.errors.len(),
            report.elapsed_ms
        );
        Ok(report)
    }

    /// Walk the root, honoring gitignore, the default-ignore set, and the
    /// caller's scope globs. Returns relative path -> (content, hash).
    async fn discover(
        &self,
        root: &Path,
        filter: &ScopeFilter,
    ) -> HashMap<String, (String, String)> {
        let entries: Vec<_> = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !scope::DEFAULT_IGNORES.contains(&name.as_ref())
            })
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .collect();

        let mut current = HashMap::new();
        for entry in entries {
            let path = entry.path();
            let language = Language::from_path(path);
            if !language.is_known() || !self.parser.supports_language(language) {
                continue;
            }
            let relative = paths::relativize(root, path);
            if !filter.matches(&relative) {
                continue;
            }
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    let hash = crate::domain::content_hash(&content);
                    current.insert(relative, (content, hash));
                }
                Err(e) => {
                    warn!("Failed to read {relative}: {e}");
                }
            }
        }
        current
    }

    /// Pass 1 for one file: parse, embed, upsert, clear stale edges.
    async fn index_file(
        &self,
        project: &str,
        filename: &str,
        content: &str,
    ) -> Result<ParsedFile, DomainError> {
        let language = Language::from_path(Path::new(filename));
        let parsed = self.parser.parse_file(content, filename, language).await?;

        let embeddings = self.embedding_service.embed_chunks(&parsed.chunks).await?;
        self.vector_store
            .upsert_chunks(project, &parsed.chunks, &embeddings)
            .await?;

        self.knowledge_graph
            .clear_source_files(project, &[filename.to_string()])
            .await?;

        debug!(
            "Indexed {} chunks, {} usages from {filename}",
            parsed.chunks.len(),
            parsed.usages.len()
        );
        Ok(parsed)
    }

    fn resolve_import(
        &self,
        language: Language,
        import: &str,
        source_file: &Path,
        root: &Path,
    ) -> Option<String> {
        let resolver = self.resolvers.iter().find(|r| r.handles(language))?;
        let absolute = resolver.resolve(import, source_file, root)?;
        Some(paths::relativize(root, &absolute))
    }

    /// Pass 2 for one file: resolve every usage to a target chunk.
    ///
    /// Resolution ladder per the linking rules: import-target lookup, then
    /// same-file lookup (both structural), then a project-global lookup in
    /// the same language with file-priority tie-break (name match).
    async fn link_file(
        &self,
        project: &Project,
        filename: &str,
        parsed: &ParsedFile,
    ) -> Result<Vec<Edge>, DomainError> {
        let language = Language::from_path(Path::new(filename));
        let source_file = project.root().join(filename);

        // Resolve each declared import once.
        let mut resolved_imports: Vec<String> = Vec::new();
        for import in &parsed.dependencies {
            if let Some(rel) =
                self.resolve_import(language, import, &source_file, project.root())
            {
                if !resolved_imports.contains(&rel) {
                    resolved_imports.push(rel);
                }
            }
        }

        let mut edges: Vec<Edge> = Vec::new();
        let mut seen: HashSet<(String, String, EdgeKind)> = HashSet::new();
        let mut linked_files: HashSet<String> = HashSet::new();

        for usage in &parsed.usages {
            if usage.containing_chunk_id().is_empty() {
                continue;
            }
            let Some((target, confidence)) = self
                .resolve_usage(project.id(), filename, language, usage, &resolved_imports)
                .await?
            else {
                continue;
            };
            if target.id() == usage.containing_chunk_id() {
                continue;
            }
            linked_files.insert(target.filename().to_string());
            push_edge(
                &mut edges,
                &mut seen,
                project.id(),
                usage.containing_chunk_id(),
                filename,
                target.id(),
                EdgeKind::from_usage(usage),
                confidence,
            );
        }

        // A resolved import with no usage-derived link into it (side-effect
        // or re-export imports) still gets a file-level import edge,
        // anchored at the first chunk of each file.
        if let Some(anchor) = parsed.chunks.first() {
            for target_file in &resolved_imports {
                if linked_files.contains(target_file) {
                    continue;
                }
                if let Some(target) = self
                    .vector_store
                    .find_by_file(project.id(), target_file)
                    .await?
                    .into_iter()
                    .next()
                {
                    push_edge(
                        &mut edges,
                        &mut seen,
                        project.id(),
                        anchor.id(),
                        filename,
                        target.id(),
                        EdgeKind::Import,
                        Confidence::Structural,
                    );
                }
            }
        }

        debug!("Linked {} edges from {filename}", edges.len());
        Ok(edges)
    }

    async fn resolve_usage(
        &self,
        project: &str,
        filename: &str,
        language: Language,
        usage: &Usage,
        resolved_imports: &[String],
    ) -> Result<Option<(Chunk, Confidence)>, DomainError> {
        let name = usage.referenced_name();

        // (a) a file named by one of this file's imports declares the name
        for target_file in resolved_imports {
            let found = self
                .vector_store
                .find_by_symbol(project, name, Some(target_file))
                .await?;
            if let Some(chunk) = found.into_iter().next() {
                return Ok(Some((chunk, Confidence::Structural)));
            }
        }

        // (b) declared in the same file
        let found = self
            .vector_store
            .find_by_symbol(project, name, Some(filename))
            .await?;
        if let Some(chunk) = found.into_iter().next() {
            return Ok(Some((chunk, Confidence::Structural)));
        }

        // (c) project-global, same language, file priority breaks ties
        let mut found = self.vector_store.find_by_symbol(project, name, None).await?;
        found.retain(|c| c.language() == language);
        found.sort_by_key(|c| {
            (
                scope::file_priority(c.filename()),
                c.filename().to_string(),
                c.start_line(),
            )
        });
        Ok(found
            .into_iter()
            .next()
            .map(|chunk| (chunk, Confidence::NameMatch)))
    }

    /// Fill author/last_modified for the files just indexed. Never blocks
    /// the passes; failures degrade to missing metadata.
    async fn enrich_git_meta<'a>(
        &self,
        project: &Project,
        files: impl Iterator<Item = &'a String>,
    ) {
        let updates: Vec<_> = stream::iter(files.cloned())
            .map(|filename| {
                let git = Arc::clone(&self.git_meta);
                let root = project.root().to_path_buf();
                async move {
                    let meta = git.file_meta(&root, &filename).await?;
                    Some((filename, meta))
                }
            })
            .buffer_unordered(16)
            .filter_map(|x| async { x })
            .collect()
            .await;

        for (filename, meta) in updates {
            if meta.author.is_none() && meta.last_modified.is_none() {
                continue;
            }
            if let Err(e) = self
                .vector_store
                .update_git_meta(
                    project.id(),
                    &filename,
                    meta.author.as_deref(),
                    meta.last_modified.as_deref(),
                )
                .await
            {
                warn!("Failed to store git meta for {filename}: {e}");
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn push_edge(
    edges: &mut Vec<Edge>,
    seen: &mut HashSet<(String, String, EdgeKind)>,
    project: &str,
    source_id: &str,
    source_file: &str,
    target_id: &str,
    kind: EdgeKind,
    confidence: Confidence,
) {
    if seen.insert((source_id.to_string(), target_id.to_string(), kind)) {
        edges.push(Edge::new(
            project,
            source_id,
            source_file,
            target_id,
            kind,
            confidence,
        ));
    }
}
