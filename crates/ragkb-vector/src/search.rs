//! Exhaustive search over the local index snapshot.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, instrument};

use ragkb_core::error::{Error, Result};
use ragkb_core::types::{Evidence, IndexStats, IndexedDocument, SearchRequest};
use ragkb_embed::CachedEmbedder;

use crate::merge::merge_variants;
use crate::mmr;
use crate::snapshot::VectorIndex;
use crate::store::IndexStore;

const MIN_PREVIEW_CHARS: usize = 20;
const FALLBACK_SOURCE: &str = "source";

pub struct LocalIndexSearch {
    store: Arc<IndexStore>,
    embedder: Arc<CachedEmbedder>,
}

impl LocalIndexSearch {
    pub fn new(store: Arc<IndexStore>, embedder: Arc<CachedEmbedder>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// Startup check: the embedding provider is usable and the index loads.
    pub fn ensure_ready(&self) -> Result<IndexStats> {
        if !self.embedder.provider().is_configured() {
            return Err(Error::EmbeddingProvider(format!(
                "embedding provider {} is not configured",
                self.embedder.provider().model_id()
            )));
        }
        self.store.stats()
    }

    pub fn reload(&self) -> Result<IndexStats> {
        let index = self.store.reload()?;
        Ok(self.store.describe(&index))
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.store.stats()
    }

    #[instrument(skip_all, fields(variants = req.query_variants.len(), top_k = req.top_k))]
    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<Evidence>> {
        // the snapshot is pinned for the whole request; a concurrent reload does not affect it
        let index = self.store.ensure()?;
        let variants = normalize_variants(&req.query_variants);
        if variants.is_empty() {
            return Ok(Vec::new());
        }
        let query_vectors = try_join_all(variants.iter().map(|v| self.embedder.embed_query(v))).await?;
        let hits = search_vectors(&index, &query_vectors, req)?;
        debug!(hits = hits.len(), "local search done");
        Ok(hits)
    }
}

/// Rank `index` against already embedded query variants.
///
/// The first query vector is the primary one used for MMR relevance. Every
/// vector's width is checked before any scoring.
pub fn search_vectors(index: &VectorIndex, query_vectors: &[Vec<f32>], req: &SearchRequest) -> Result<Vec<Evidence>> {
    if let Some(bad) = query_vectors.iter().find(|q| q.len() != index.dim()) {
        return Err(Error::EmbedDimMismatch {
            index_dim: index.dim(),
            query_dim: bad.len(),
            index_model: index.model().to_string(),
        });
    }
    let Some(primary) = query_vectors.first() else {
        return Ok(Vec::new());
    };

    let ranked = merge_variants(query_vectors, index.vectors());
    let picked = if req.use_mmr && ranked.len() > req.top_k {
        mmr::select(primary, &ranked, index.vectors(), req.top_k, req.mmr_lambda)
    } else {
        ranked.into_iter().take(req.top_k).collect()
    };

    let evidence = picked
        .into_iter()
        .map(|c| to_evidence(&index.docs()[c.doc_index], c.score, req.preview_length))
        .filter(|e| req.min_score.map_or(true, |min| e.score >= min))
        .collect();
    Ok(evidence)
}

fn to_evidence(doc: &IndexedDocument, score: f32, preview_length: usize) -> Evidence {
    let source = doc.metadata.source.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(FALLBACK_SOURCE);
    Evidence {
        source: basename(source),
        score,
        preview: preview(&doc.text, preview_length),
        text: doc.text.clone(),
        metadata: doc.metadata.clone(),
    }
}

/// Final path component of `path`, accepting both separators.
pub fn basename(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches(|c: char| c == '/' || c == '\\');
    let name = trimmed.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(trimmed);
    if name.is_empty() {
        path.trim().to_string()
    } else {
        name.to_string()
    }
}

/// Leading `max(20, len)` characters with whitespace runs collapsed.
pub fn preview(text: &str, len: usize) -> String {
    let head: String = text.chars().take(len.max(MIN_PREVIEW_CHARS)).collect();
    head.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim, drop blanks and repeated variants, keeping first-seen order.
pub fn normalize_variants(variants: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(variants.len());
    for v in variants {
        let v = v.trim();
        if !v.is_empty() && !out.iter().any(|seen| seen == v) {
            out.push(v.to_string());
        }
    }
    out
}
