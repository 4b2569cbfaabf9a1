use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

/// Text chunks produced by a streaming generation call.
pub type TextStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:d768`).
    fn model_id(&self) -> &str;
    /// Whether credentials or local assets needed by `embed` are present.
    fn is_configured(&self) -> bool {
        true
    }
    /// Embed one text. Failures are reported as `Error::EmbeddingProvider`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_id(&self) -> &str;
    /// Full completion. Quota exhaustion must surface as `Error::RateLimited`
    /// and provider-side deadlines as `Error::GenerationTimeout`.
    async fn generate(&self, prompt: &str) -> Result<String>;
    /// Streaming completion; the returned stream yields text deltas.
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream>;
}
