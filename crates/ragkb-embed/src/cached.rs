use std::sync::Arc;
use tracing::debug;

use ragkb_core::traits::EmbeddingProvider;
use ragkb_core::Result;

use crate::cache::{normalize_key, QueryEmbeddingCache};

/// Embedding provider front with a query cache.
///
/// A miss performs exactly one provider call and the vector is stored only
/// after that call returned successfully, so a caller that gives up on the
/// future (timeout, disconnect) never leaves a partial entry behind.
pub struct CachedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: QueryEmbeddingCache,
}

impl CachedEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: QueryEmbeddingCache) -> Self {
        Self { provider, cache }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn cache(&self) -> &QueryEmbeddingCache {
        &self.cache
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let key = normalize_key(text);
        if let Some(hit) = self.cache.get(&key) {
            debug!(model = self.provider.model_id(), "query embedding cache hit");
            return Ok(hit);
        }
        let vector = self.provider.embed(&key).await?;
        self.cache.set(&key, vector.clone());
        Ok(vector)
    }
}
