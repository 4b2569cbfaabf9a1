use std::sync::Arc;
use std::time::Duration;

use ragkb_embed::{CachedEmbedder, HashingEmbedder, QueryEmbeddingCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let embedder = CachedEmbedder::new(Arc::new(HashingEmbedder::new(384)), QueryEmbeddingCache::new(16, Duration::from_secs(60)));
    for text in ["hello world", "rust embeddings", "hello world"] {
        let v = embedder.embed_query(text).await?;
        println!("{text:?} -> dim={} cached={}", v.len(), embedder.cache().len());
    }
    Ok(())
}
