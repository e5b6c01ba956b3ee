//! Adapter tests for the DuckDB-backed vector store.

use code_intel::{
    content_hash, Chunk, DomainError, Embedding, Language, SymbolKind, VectorStore,
};
use code_intel::DuckdbVectorStore;

const DIMS: usize = 8;
const PROJECT: &str = "deadbeefdeadbeefdeadbeefdeadbeef";

fn store(dir: &tempfile::TempDir) -> DuckdbVectorStore {
    DuckdbVectorStore::new(dir.path(), DIMS).unwrap()
}

fn chunk(filename: &str, symbol: &str, start: u32, content: &str) -> Chunk {
    Chunk::new(
        filename,
        symbol,
        SymbolKind::Function,
        start,
        start + 2,
        content,
        Language::Python,
    )
    .with_signature(format!("{symbol}()"))
    .with_dependencies(vec!["json".to_string()])
    .with_content_hash(content_hash(content))
}

fn embedding(chunk: &Chunk, seed: f32) -> Embedding {
    let mut vector = vec![seed; DIMS];
    vector[0] = 1.0;
    Embedding::new(chunk.id().to_string(), vector, "test-model".to_string())
}

fn pair(filename: &str, symbol: &str, start: u32, content: &str) -> (Chunk, Embedding) {
    let c = chunk(filename, symbol, start, content);
    let e = embedding(&c, 0.5);
    (c, e)
}

#[tokio::test]
async fn test_upsert_then_find_by_symbol_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);

    let (c, e) = pair("src/auth.py", "verify", 10, "def verify(t):\n    return t\n");
    store.upsert_chunks(PROJECT, &[c.clone()], &[e]).await.unwrap();

    let found = store.find_by_symbol(PROJECT, "verify", None).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), c.id());
    assert_eq!(found[0].filename(), "src/auth.py");
    assert_eq!(found[0].signature(), "verify()");
    assert_eq!(found[0].dependencies(), &["json".to_string()]);
    assert_eq!(found[0].content_hash(), c.content_hash());
}

#[tokio::test]
async fn test_upsert_replaces_rows_by_filename() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);

    let (old_a, e1) = pair("a.py", "old_name", 1, "def old_name():\n    pass\n");
    let (keep_b, e2) = pair("b.py", "keeper", 1, "def keeper():\n    pass\n");
    store
        .upsert_chunks(PROJECT, &[old_a, keep_b.clone()], &[e1, e2])
        .await
        .unwrap();

    let (new_a, e3) = pair("a.py", "new_name", 1, "def new_name():\n    pass\n");
    store.upsert_chunks(PROJECT, &[new_a], &[e3]).await.unwrap();

    assert!(store
        .find_by_symbol(PROJECT, "old_name", None)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        store.find_by_symbol(PROJECT, "new_name", None).await.unwrap().len(),
        1
    );
    assert_eq!(
        store.find_by_symbol(PROJECT, "keeper", None).await.unwrap().len(),
        1,
        "other files are untouched"
    );
}

#[tokio::test]
async fn test_search_orders_by_cosine_distance() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);

    let near = chunk("a.py", "near", 1, "def near():\n    pass\n");
    let far = chunk("b.py", "far", 1, "def far():\n    pass\n");
    let mut near_vec = vec![0.0; DIMS];
    near_vec[0] = 1.0;
    let mut far_vec = vec![0.0; DIMS];
    far_vec[1] = 1.0;

    store
        .upsert_chunks(
            PROJECT,
            &[near.clone(), far.clone()],
            &[
                Embedding::new(near.id().to_string(), near_vec.clone(), "m".into()),
                Embedding::new(far.id().to_string(), far_vec, "m".into()),
            ],
        )
        .await
        .unwrap();

    let hits = store.search(PROJECT, &near_vec, 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk().symbol_name(), "near");
    assert!(hits[0].score() > hits[1].score());
}

#[tokio::test]
async fn test_reads_on_unindexed_project_return_empty_without_creating_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);

    assert!(store
        .find_by_symbol("ffffffffffffffffffffffffffffffff", "x", None)
        .await
        .unwrap()
        .is_empty());
    assert!(store
        .search("ffffffffffffffffffffffffffffffff", &vec![0.0; DIMS], 5)
        .await
        .unwrap()
        .is_empty());
    assert!(store
        .file_hashes("ffffffffffffffffffffffffffffffff")
        .await
        .unwrap()
        .is_empty());

    // The read gate must not have created a database file.
    assert!(!dir
        .path()
        .join("db/ffffffffffffffffffffffffffffffff.duckdb")
        .exists());
}

#[tokio::test]
async fn test_file_hashes_reflect_stored_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);

    let (a, ea) = pair("a.py", "foo", 1, "def foo():\n    pass\n");
    let (b, eb) = pair("b.py", "bar", 1, "def bar():\n    pass\n");
    let expected_a = a.content_hash().to_string();
    store.upsert_chunks(PROJECT, &[a, b], &[ea, eb]).await.unwrap();

    let hashes = store.file_hashes(PROJECT).await.unwrap();
    assert_eq!(hashes.len(), 2);
    assert_eq!(hashes.get("a.py"), Some(&expected_a));
}

#[tokio::test]
async fn test_find_containing_text_escapes_wildcards() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);

    let (c1, e1) = pair("a.py", "pct", 1, "rate = '100%_done'\n");
    let (c2, e2) = pair("b.py", "plain", 1, "rate = '100x done'\n");
    store.upsert_chunks(PROJECT, &[c1, c2], &[e1, e2]).await.unwrap();

    // `%` and `_` match literally, not as LIKE wildcards.
    let found = store
        .find_containing_text(PROJECT, "100%_done", 10)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].filename(), "a.py");
}

#[tokio::test]
async fn test_find_containing_text_rejects_injection() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let (c, e) = pair("a.py", "foo", 1, "def foo():\n    pass\n");
    store.upsert_chunks(PROJECT, &[c], &[e]).await.unwrap();

    let result = store
        .find_containing_text(PROJECT, "x' OR '1'='1", 10)
        .await;
    assert!(matches!(result, Err(DomainError::FilterInjection(_))));
}

#[tokio::test]
async fn test_update_git_meta_fills_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let (c, e) = pair("a.py", "foo", 1, "def foo():\n    pass\n");
    store.upsert_chunks(PROJECT, &[c], &[e]).await.unwrap();

    store
        .update_git_meta(PROJECT, "a.py", Some("dev"), Some("2026-06-01T10:00:00+00:00"))
        .await
        .unwrap();

    let found = store.find_by_symbol(PROJECT, "foo", None).await.unwrap();
    assert_eq!(found[0].author(), Some("dev"));
    assert_eq!(found[0].last_modified(), Some("2026-06-01T10:00:00+00:00"));
}

#[tokio::test]
async fn test_delete_project_drops_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let (c, e) = pair("a.py", "foo", 1, "def foo():\n    pass\n");
    store.upsert_chunks(PROJECT, &[c], &[e]).await.unwrap();

    store.delete_project(PROJECT).await.unwrap();

    assert!(store
        .find_by_symbol(PROJECT, "foo", None)
        .await
        .unwrap()
        .is_empty());
    assert!(!dir.path().join(format!("db/{PROJECT}.duckdb")).exists());
}

#[tokio::test]
async fn test_stats_aggregates() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);

    let complex = chunk("a.py", "gnarly", 1, "def gnarly():\n    pass\n").with_complexity(15);
    let simple = chunk("b.py", "tidy", 1, "def tidy():\n    pass\n");
    let e1 = embedding(&complex, 0.1);
    let e2 = embedding(&simple, 0.2);
    store
        .upsert_chunks(PROJECT, &[complex, simple], &[e1, e2])
        .await
        .unwrap();

    let stats = store.stats(PROJECT, 10).await.unwrap();
    assert_eq!(stats.total_chunks, 2);
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.languages.get("python"), Some(&(2, 2)));
    assert_eq!(stats.high_complexity.len(), 1);
    assert_eq!(stats.high_complexity[0].symbol_name(), "gnarly");
    assert_eq!(stats.dependency_hubs[0], ("json".to_string(), 2));
    assert_eq!(stats.filenames.len(), 2);
}
