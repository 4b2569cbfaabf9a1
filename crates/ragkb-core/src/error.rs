use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Vector index not found at {}", path.display())]
    IndexNotFound { path: PathBuf },

    #[error("Invalid vector index: {0}")]
    InvalidIndex(String),

    #[error("Embedding dimension mismatch: index '{index_model}' expects {index_dim}, query has {query_dim}")]
    EmbedDimMismatch { index_dim: usize, query_dim: usize, index_model: String },

    #[error("Embedding provider failed: {0}")]
    EmbeddingProvider(String),

    #[error("Request timed out after {timeout_ms}ms")]
    GenerationTimeout { timeout_ms: u64 },

    #[error("Rate limited by generation provider{}", retry_hint(*retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Knowledge base file '{name}' not found")]
    KbFileNotFound { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed index artifact: {0}")]
    Json(#[from] serde_json::Error),
}

fn retry_hint(secs: Option<u64>) -> String {
    secs.map(|s| format!(", retry after {s}s")).unwrap_or_default()
}

impl Error {
    /// Stable identifier surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::IndexNotFound { .. } => "vector_index_absent",
            Error::InvalidIndex(_) | Error::Json(_) => "invalid_index",
            Error::EmbedDimMismatch { .. } => "embed_dim_mismatch",
            Error::EmbeddingProvider(_) => "embedding_provider_error",
            Error::GenerationTimeout { .. } => "timeout",
            Error::RateLimited { .. } => "quota_exceeded",
            Error::Generation(_) => "llm_error",
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidRequest(_) => "invalid_request",
            Error::KbFileNotFound { .. } => "kb_file_not_found",
            Error::Io(_) => "io_error",
        }
    }

    /// "Try again later" conditions, as opposed to configuration or data problems.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. } | Error::GenerationTimeout { .. })
    }

    /// Operator hint for conditions that need an action outside the request.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::IndexNotFound { .. } => Some("build the index first, then call reload"),
            Error::EmbedDimMismatch { .. } => Some("the query embedding model differs from the one used to build the index"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
