//! Managed vector store backend.
//!
//! The store owns the vectors, so there is nothing to load or reload here;
//! every variant is sent as its own top-k query and the matches are merged by
//! chunk identity keeping the best score.

use async_trait::async_trait;
use futures::future::try_join_all;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use ragkb_core::error::{Error, Result};
use ragkb_core::types::{DocumentMetadata, Evidence, IndexStats, SearchRequest};
use ragkb_embed::CachedEmbedder;

use crate::search::{basename, normalize_variants, preview};

/// One match returned by the remote store. `score` may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteMatch {
    pub text: String,
    pub metadata: DocumentMetadata,
    pub score: Option<f32>,
}

#[async_trait]
pub trait VectorQueryClient: Send + Sync {
    fn index_name(&self) -> &str;
    /// Credentials and index name are present.
    fn is_configured(&self) -> bool;
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RemoteMatch>>;
}

pub struct RemoteVectorStore {
    client: Arc<dyn VectorQueryClient>,
    embedder: Arc<CachedEmbedder>,
}

impl RemoteVectorStore {
    pub fn new(client: Arc<dyn VectorQueryClient>, embedder: Arc<CachedEmbedder>) -> Self {
        Self { client, embedder }
    }

    pub fn ensure_ready(&self) -> Result<IndexStats> {
        if !self.client.is_configured() {
            return Err(Error::InvalidConfig(format!(
                "remote vector store {:?} is missing credentials or index name",
                self.client.index_name()
            )));
        }
        if !self.embedder.provider().is_configured() {
            return Err(Error::EmbeddingProvider(format!(
                "embedding provider {} is not configured",
                self.embedder.provider().model_id()
            )));
        }
        Ok(self.stats())
    }

    /// Nothing cached locally; reports the current stats.
    pub fn reload(&self) -> Result<IndexStats> {
        Ok(self.stats())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            backend: "remote".to_string(),
            model: Some(self.embedder.provider().model_id().to_string()),
            dim: None,
            doc_count: None,
            vector_count: None,
            created_at: None,
            path: Some(self.client.index_name().to_string()),
        }
    }

    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<Evidence>> {
        let variants = normalize_variants(&req.query_variants);
        if variants.is_empty() || req.top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vectors = try_join_all(variants.iter().map(|v| self.embedder.embed_query(v))).await?;
        let batches = try_join_all(query_vectors.iter().map(|q| self.client.query(q, req.top_k))).await?;

        let mut best: HashMap<String, (usize, RemoteMatch)> = HashMap::new();
        let mut seen = 0usize;
        for m in batches.into_iter().flatten() {
            let key = match_key(&m);
            match best.get_mut(&key) {
                Some((_, kept)) => {
                    if m.score.unwrap_or(0.0) > kept.score.unwrap_or(0.0) {
                        *kept = m;
                    }
                }
                None => {
                    best.insert(key, (seen, m));
                    seen += 1;
                }
            }
        }

        let mut merged: Vec<(usize, RemoteMatch)> = best.into_values().collect();
        merged.sort_by(|(ia, a), (ib, b)| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
                .then(ia.cmp(ib))
        });

        let evidence: Vec<Evidence> = merged
            .into_iter()
            .map(|(_, m)| m)
            .filter(|m| req.min_score.map_or(true, |min| m.score.unwrap_or(0.0) >= min))
            .take(req.top_k)
            .map(|m| {
                let source = m.metadata.source.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or("unknown");
                Evidence {
                    source: basename(source),
                    score: m.score.unwrap_or(0.0),
                    preview: preview(&m.text, req.preview_length),
                    text: m.text,
                    metadata: m.metadata,
                }
            })
            .collect();
        debug!(index = self.client.index_name(), hits = evidence.len(), "remote search done");
        Ok(evidence)
    }
}

fn match_key(m: &RemoteMatch) -> String {
    match (&m.metadata.source, m.metadata.chunk) {
        (Some(source), Some(chunk)) => format!("{source}#{chunk}"),
        _ => m.text.clone(),
    }
}
