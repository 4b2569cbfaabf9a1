//! Persisted index artifact and the immutable in-memory snapshot built from it.
//!
//! The artifact is a single JSON record written by the index builder:
//! `{ model, createdAt, dim, docs: [{ text, metadata }], vectors: [[f32]] }`.
//! A snapshot is only constructed when `docs` and `vectors` line up and every
//! vector has exactly `dim` components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use ragkb_core::error::{Error, Result};
use ragkb_core::types::IndexedDocument;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexArtifact {
    pub model: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub dim: usize,
    pub docs: Vec<IndexedDocument>,
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Debug)]
pub struct VectorIndex {
    model: String,
    dim: usize,
    created_at: Option<DateTime<Utc>>,
    docs: Vec<IndexedDocument>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(
        model: impl Into<String>,
        dim: usize,
        created_at: Option<DateTime<Utc>>,
        docs: Vec<IndexedDocument>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if docs.len() != vectors.len() {
            return Err(Error::InvalidIndex(format!("{} docs but {} vectors", docs.len(), vectors.len())));
        }
        if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
            return Err(Error::InvalidIndex(format!("vector {i} has {} components, expected {dim}", v.len())));
        }
        Ok(Self { model: model.into(), dim, created_at, docs, vectors })
    }

    pub fn from_artifact(artifact: IndexArtifact) -> Result<Self> {
        Self::new(artifact.model, artifact.dim, artifact.created_at, artifact.docs, artifact.vectors)
    }

    /// Read and validate the artifact at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::IndexNotFound { path: path.to_path_buf() });
        }
        let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::IndexNotFound { path: path.to_path_buf() },
            _ => Error::Io(e),
        })?;
        let artifact: IndexArtifact = serde_json::from_str(&raw)?;
        Self::from_artifact(artifact)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn docs(&self) -> &[IndexedDocument] {
        &self.docs
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_mismatch() {
        let err = VectorIndex::new("m", 2, None, vec![IndexedDocument::default()], vec![]).unwrap_err();
        assert_eq!(err.code(), "invalid_index");
    }

    #[test]
    fn rejects_wrong_vector_width() {
        let docs = vec![IndexedDocument::default(), IndexedDocument::default()];
        let err = VectorIndex::new("m", 2, None, docs, vec![vec![1.0, 0.0], vec![1.0]]).unwrap_err();
        assert!(err.to_string().contains("vector 1"), "{err}");
    }

    #[test]
    fn parses_builder_output() {
        let raw = r#"{
            "model": "text-embedding-004",
            "createdAt": "2024-05-01T10:00:00.000Z",
            "dim": 2,
            "docs": [{"text": "t", "metadata": {"source": "kb/a.md", "fullPath": "/kb/a.md", "chunk": 0}}],
            "vectors": [[0.5, 0.5]]
        }"#;
        let artifact: IndexArtifact = serde_json::from_str(raw).unwrap();
        let index = VectorIndex::from_artifact(artifact).unwrap();
        assert_eq!(index.model(), "text-embedding-004");
        assert_eq!(index.len(), 1);
        assert!(index.created_at().is_some());
    }
}
