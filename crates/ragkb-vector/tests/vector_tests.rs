use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ragkb_core::config::{BackendKind, RagSettings};
use ragkb_core::traits::EmbeddingProvider;
use ragkb_core::types::{DocumentMetadata, IndexedDocument, SearchRequest};
use ragkb_core::{Error, Result};
use ragkb_embed::{CachedEmbedder, QueryEmbeddingCache};
use ragkb_vector::{
    search_vectors, IndexStore, LocalIndexSearch, RemoteMatch, SearchBackend, VectorIndex, VectorQueryClient,
};

fn doc(source: &str, text: &str, chunk: i64) -> IndexedDocument {
    IndexedDocument {
        text: text.to_string(),
        metadata: DocumentMetadata { source: Some(source.to_string()), chunk: Some(chunk), ..Default::default() },
    }
}

fn three_docs() -> VectorIndex {
    VectorIndex::new(
        "test-model",
        2,
        None,
        vec![doc("kb/a.md", "alpha text", 0), doc("kb/b.md", "beta text", 0), doc("kb/c.md", "gamma text", 0)],
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.9, 0.1]],
    )
    .unwrap()
}

fn write_artifact(path: &Path, n: usize) {
    let docs: Vec<serde_json::Value> = (0..n)
        .map(|i| serde_json::json!({ "text": format!("chunk {i}"), "metadata": { "source": format!("kb/f{i}.md"), "chunk": 0 } }))
        .collect();
    let vectors: Vec<Vec<f32>> = (0..n).map(|i| vec![1.0, i as f32]).collect();
    let artifact = serde_json::json!({
        "model": "test-model",
        "createdAt": "2024-05-01T10:00:00Z",
        "dim": 2,
        "docs": docs,
        "vectors": vectors,
    });
    std::fs::write(path, serde_json::to_string(&artifact).unwrap()).unwrap();
}

/// Maps known query strings to fixed vectors.
struct FixedEmbedder {
    table: HashMap<String, Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn model_id(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| Error::EmbeddingProvider(format!("no vector for {text:?}")))
    }
}

fn fixed_embedder(entries: &[(&str, Vec<f32>)]) -> Arc<CachedEmbedder> {
    let table = entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    Arc::new(CachedEmbedder::new(
        Arc::new(FixedEmbedder { table }),
        QueryEmbeddingCache::new(16, Duration::from_secs(60)),
    ))
}

fn sources(hits: &[ragkb_core::types::Evidence]) -> Vec<&str> {
    hits.iter().map(|h| h.source.as_str()).collect()
}

#[test]
fn ranking_follows_cosine_order() {
    let index = three_docs();
    let req = SearchRequest::new(["q"]).with_top_k(3).with_mmr(false);
    let hits = search_vectors(&index, &[vec![1.0, 0.0]], &req).unwrap();
    assert_eq!(sources(&hits), vec!["a.md", "c.md", "b.md"]);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert!((hits[1].score - 0.994).abs() < 1e-3);
    assert!(hits[2].score.abs() < 1e-6);
}

#[test]
fn top_k_without_mmr_truncates_ranking() {
    let index = three_docs();
    let req = SearchRequest::new(["q"]).with_top_k(2).with_mmr(false);
    let hits = search_vectors(&index, &[vec![1.0, 0.0]], &req).unwrap();
    assert_eq!(sources(&hits), vec!["a.md", "c.md"]);
}

#[test]
fn variants_merge_by_max_score() {
    let index = three_docs();
    let req = SearchRequest::new(["q1", "q2"]).with_top_k(3).with_mmr(false);
    let hits = search_vectors(&index, &[vec![1.0, 0.0], vec![0.0, 1.0]], &req).unwrap();
    // b.md scores 0 against the first variant but 1 against the second
    assert_eq!(sources(&hits), vec!["a.md", "b.md", "c.md"]);
    assert!((hits[1].score - 1.0).abs() < 1e-6);
}

#[test]
fn mmr_starts_with_most_relevant_and_respects_lambda() {
    let index = three_docs();
    let relevance_heavy = SearchRequest::new(["q"]).with_top_k(2).with_lambda(0.7);
    let hits = search_vectors(&index, &[vec![1.0, 0.0]], &relevance_heavy).unwrap();
    assert_eq!(sources(&hits), vec!["a.md", "c.md"]);

    let diversity_only = SearchRequest::new(["q"]).with_top_k(2).with_lambda(0.0);
    let hits = search_vectors(&index, &[vec![1.0, 0.0]], &diversity_only).unwrap();
    assert_eq!(sources(&hits), vec!["a.md", "b.md"]);
}

#[test]
fn mmr_with_single_slot_keeps_top_document() {
    let index = three_docs();
    let req = SearchRequest::new(["q"]).with_top_k(1).with_mmr(true).with_lambda(0.7);
    let hits = search_vectors(&index, &[vec![1.0, 0.0]], &req).unwrap();
    assert_eq!(sources(&hits), vec!["a.md"]);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn dimension_mismatch_is_reported() {
    let index = three_docs();
    let req = SearchRequest::new(["q"]);
    let err = search_vectors(&index, &[vec![1.0, 0.0, 0.0]], &req).unwrap_err();
    match &err {
        Error::EmbedDimMismatch { index_dim, query_dim, index_model } => {
            assert_eq!((*index_dim, *query_dim), (2, 3));
            assert_eq!(index_model, "test-model");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.code(), "embed_dim_mismatch");
}

#[test]
fn min_score_is_inclusive() {
    let index = three_docs();
    let zero = SearchRequest::new(["q"]).with_top_k(3).with_mmr(false).with_min_score(Some(0.0));
    assert_eq!(search_vectors(&index, &[vec![1.0, 0.0]], &zero).unwrap().len(), 3);

    let strict = SearchRequest::new(["q"]).with_top_k(3).with_mmr(false).with_min_score(Some(0.5));
    assert_eq!(sources(&search_vectors(&index, &[vec![1.0, 0.0]], &strict).unwrap()), vec!["a.md", "c.md"]);
}

#[test]
fn missing_source_falls_back() {
    let index = VectorIndex::new("m", 1, None, vec![IndexedDocument::default()], vec![vec![1.0]]).unwrap();
    let hits = search_vectors(&index, &[vec![1.0]], &SearchRequest::new(["q"])).unwrap();
    assert_eq!(hits[0].source, "source");
}

#[test]
fn store_reports_missing_artifact() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = IndexStore::new(dir.path().join("index.json"));
    let err = store.ensure().unwrap_err();
    assert!(matches!(err, Error::IndexNotFound { .. }));
    assert_eq!(err.code(), "vector_index_absent");
    assert!(!store.is_loaded());
    Ok(())
}

#[test]
fn reload_swaps_snapshot_without_touching_readers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("index.json");
    write_artifact(&path, 3);
    let store = IndexStore::new(&path);

    let before = store.ensure()?;
    assert_eq!(before.len(), 3);
    // memoized: a second ensure hands out the same snapshot
    assert!(Arc::ptr_eq(&before, &store.ensure()?));

    write_artifact(&path, 5);
    assert_eq!(store.ensure()?.len(), 3, "ensure must not reload");
    let after = store.reload()?;
    assert_eq!(after.len(), 5);
    assert_eq!(before.len(), 3, "old snapshot is unchanged");

    let stats = store.stats()?;
    assert_eq!(stats.doc_count, Some(5));
    assert_eq!(stats.vector_count, Some(5));
    assert_eq!(stats.dim, Some(2));
    assert!(stats.created_at.is_some());
    Ok(())
}

#[test]
fn failed_reload_leaves_store_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("index.json");
    write_artifact(&path, 2);
    let store = IndexStore::new(&path);
    store.ensure()?;

    std::fs::remove_file(&path)?;
    assert!(store.reload().is_err());
    assert!(!store.is_loaded());
    Ok(())
}

#[test]
fn concurrent_readers_during_reload() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("index.json");
    write_artifact(&path, 4);
    let store = Arc::new(IndexStore::new(&path));
    store.ensure()?;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    if let Ok(index) = store.ensure() {
                        // every observed snapshot is internally consistent
                        assert_eq!(index.docs().len(), index.vectors().len());
                    }
                }
            })
        })
        .collect();
    for _ in 0..20 {
        store.reload()?;
    }
    for r in readers {
        r.join().expect("reader panicked");
    }
    Ok(())
}

#[tokio::test]
async fn local_search_end_to_end() -> anyhow::Result<()> {
    let store = Arc::new(IndexStore::with_snapshot("unused.json", three_docs()));
    let embedder = fixed_embedder(&[("north", vec![1.0, 0.0]), ("east", vec![0.0, 1.0])]);
    let search = LocalIndexSearch::new(store, Arc::clone(&embedder));

    let req = SearchRequest::new(["north", " north ", ""]).with_top_k(2).with_mmr(false);
    let hits = search.search(&req).await?;
    assert_eq!(sources(&hits), vec!["a.md", "c.md"]);
    assert_eq!(hits[0].text, "alpha text");
    assert_eq!(embedder.cache().len(), 1);

    let both = SearchRequest::new(["north", "east"]).with_top_k(3).with_mmr(false);
    let hits = search.search(&both).await?;
    assert_eq!(sources(&hits), vec!["a.md", "b.md", "c.md"]);
    Ok(())
}

#[tokio::test]
async fn local_search_rejects_wrong_width_query() {
    let store = Arc::new(IndexStore::with_snapshot("unused.json", three_docs()));
    let embedder = fixed_embedder(&[("wide", vec![1.0, 0.0, 0.0])]);
    let search = LocalIndexSearch::new(store, embedder);
    let err = search.search(&SearchRequest::new(["wide"])).await.unwrap_err();
    assert!(matches!(err, Error::EmbedDimMismatch { index_dim: 2, query_dim: 3, .. }));
}

#[tokio::test]
async fn backend_from_settings_loads_relative_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("vectorstore"))?;
    write_artifact(&dir.path().join("vectorstore/index.json"), 3);

    let settings = RagSettings::default();
    let backend = SearchBackend::from_settings(&settings, dir.path(), fixed_embedder(&[]), None)?;
    assert_eq!(backend.name(), "local");
    let stats = backend.ensure_ready()?;
    assert_eq!(stats.backend, "local");
    assert_eq!(stats.doc_count, Some(3));
    assert_eq!(backend.reload()?.doc_count, Some(3));
    Ok(())
}

struct CannedClient {
    configured: bool,
}

#[async_trait]
impl VectorQueryClient for CannedClient {
    fn index_name(&self) -> &str {
        "kb-index"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn query(&self, vector: &[f32], _top_k: usize) -> Result<Vec<RemoteMatch>> {
        let m = |source: &str, score: f32| RemoteMatch {
            text: format!("text of {source}"),
            metadata: DocumentMetadata { source: Some(source.to_string()), chunk: Some(0), ..Default::default() },
            score: Some(score),
        };
        if vector[0] > 0.5 {
            Ok(vec![m("docs/a.md", 0.9), m("docs/b.md", 0.4)])
        } else {
            Ok(vec![m("docs/b.md", 0.8), m("docs/c.md", 0.3)])
        }
    }
}

#[tokio::test]
async fn remote_backend_merges_variants() -> anyhow::Result<()> {
    let settings = RagSettings { backend: BackendKind::Remote, ..RagSettings::default() };
    let embedder = fixed_embedder(&[("north", vec![1.0, 0.0]), ("east", vec![0.0, 1.0])]);
    let client: Arc<dyn VectorQueryClient> = Arc::new(CannedClient { configured: true });
    let backend = SearchBackend::from_settings(&settings, Path::new("."), embedder, Some(client))?;
    assert_eq!(backend.ensure_ready()?.backend, "remote");

    let hits = backend.search(&SearchRequest::new(["north", "east"]).with_top_k(2)).await?;
    assert_eq!(sources(&hits), vec!["a.md", "b.md"]);
    assert!((hits[1].score - 0.8).abs() < 1e-6, "best score kept for b.md");
    Ok(())
}

#[test]
fn remote_backend_requires_client_and_configuration() {
    let settings = RagSettings { backend: BackendKind::Remote, ..RagSettings::default() };
    let missing = SearchBackend::from_settings(&settings, Path::new("."), fixed_embedder(&[]), None);
    assert!(matches!(missing, Err(Error::InvalidConfig(_))));

    let client: Arc<dyn VectorQueryClient> = Arc::new(CannedClient { configured: false });
    let backend = SearchBackend::from_settings(&settings, Path::new("."), fixed_embedder(&[]), Some(client)).unwrap();
    assert_eq!(backend.ensure_ready().unwrap_err().code(), "invalid_config");
}
