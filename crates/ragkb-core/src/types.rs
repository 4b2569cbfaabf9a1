//! Domain types shared by the index store, the search backends and the answer pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata attached to an indexed chunk by the index builder.
///
/// `source` is the file the chunk was cut from (the builder may store a full
/// path), `full_path` its absolute location, `chunk` the position within the
/// file. Unknown keys are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "fullPath", default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A chunk of a source document with its text payload. Immutable once indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Position of a document in the loaded snapshot plus its relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub doc_index: usize,
    pub score: f32,
}

/// A retrieved passage as returned to the caller.
///
/// `source` is always a bare file name, never a full path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: String,
    pub score: f32,
    pub preview: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Parameters of one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub query_variants: Vec<String>,
    pub top_k: usize,
    pub min_score: Option<f32>,
    pub use_mmr: bool,
    pub preview_length: usize,
    pub mmr_lambda: f32,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query_variants: Vec::new(),
            top_k: 3,
            min_score: None,
            use_mmr: true,
            preview_length: 220,
            mmr_lambda: 0.7,
        }
    }
}

impl SearchRequest {
    pub fn new<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { query_variants: variants.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_mmr(mut self, use_mmr: bool) -> Self {
        self.use_mmr = use_mmr;
        self
    }

    pub fn with_preview_length(mut self, preview_length: usize) -> Self {
        self.preview_length = preview_length;
        self
    }

    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.mmr_lambda = lambda;
        self
    }
}

/// Read-only description of the active search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub backend: String,
    pub model: Option<String>,
    pub dim: Option<usize>,
    pub doc_count: Option<usize>,
    pub vector_count: Option<usize>,
    pub created_at: Option<DateTime<Utc>>,
    pub path: Option<String>,
}

/// How a draft answer is checked against the supplied evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArbiterMode {
    Off,
    #[default]
    Rules,
    Llm,
}

/// What rules mode does when only some cited sources were supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialCitationPolicy {
    #[default]
    Reject,
    Strip,
}

/// Outcome of arbitration. Rejections are policy results, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Accepted,
    MissingSources,
    UnknownSources { rejected: Vec<String> },
    Stripped { removed: Vec<String> },
    Refereed,
    RefereeFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationResult {
    pub final_text: String,
    pub accepted: bool,
    pub verdict: Verdict,
}
