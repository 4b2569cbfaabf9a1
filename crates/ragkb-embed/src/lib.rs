use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use twox_hash::XxHash64;

use ragkb_core::traits::EmbeddingProvider;
use ragkb_core::Result;

pub mod cache;
pub mod cached;

pub use cache::{normalize_key, QueryEmbeddingCache, MAX_KEY_CHARS};
pub use cached::CachedEmbedder;

pub const DEFAULT_DIM: usize = 768;

/// Deterministic bag-of-words embedder: every whitespace token is hashed into
/// one of `dim` buckets and the result is L2-normalized. Needs no model files
/// or network, which makes it the embedder of choice for tests and offline runs.
pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hash:d{dim}") }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

/// Default embedder for the binaries. Dimension comes from `APP_EMBED_DIM`.
pub fn default_embedder() -> Arc<dyn EmbeddingProvider> {
    let dim = std::env::var("APP_EMBED_DIM").ok().and_then(|v| v.parse::<usize>().ok()).unwrap_or(DEFAULT_DIM);
    tracing::info!(dim, "using hashing embedder");
    Arc::new(HashingEmbedder::new(dim))
}
