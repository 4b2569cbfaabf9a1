//! Read-only access to the source documents behind the index.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use ragkb_core::error::{Error, Result};
use ragkb_vector::search::basename;

/// Reads stop after this many bytes.
pub const MAX_FILE_BYTES: usize = 200 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbFile {
    /// Bare file name that was looked up.
    pub source: String,
    /// Size of the whole file on disk.
    pub size: u64,
    pub truncated: bool,
    pub content: String,
}

/// A knowledge base directory. Lookups only ever see files directly inside it.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    root: PathBuf,
}

impl KnowledgeBase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `source` inside the knowledge base. Only the file name part of
    /// `source` is kept; names that would leave the directory are rejected.
    pub fn locate(&self, source: &str) -> Result<(String, PathBuf)> {
        let source = source.trim();
        if source.is_empty() {
            return Err(Error::InvalidRequest("missing source".into()));
        }
        let name = basename(source);
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(Error::InvalidRequest(format!("invalid path {source:?}")));
        }
        let full = self.root.join(&name);
        if !full.starts_with(&self.root) {
            return Err(Error::InvalidRequest(format!("invalid path {source:?}")));
        }
        Ok((name, full))
    }

    pub fn contains(&self, source: &str) -> bool {
        self.locate(source).map(|(_, full)| full.is_file()).unwrap_or(false)
    }

    /// Content of `source`, cut to [`MAX_FILE_BYTES`].
    pub async fn read(&self, source: &str) -> Result<KbFile> {
        let (name, full) = self.locate(source)?;
        if !full.is_file() {
            return Err(Error::KbFileNotFound { name });
        }
        let bytes = tokio::fs::read(&full).await?;
        let truncated = bytes.len() > MAX_FILE_BYTES;
        let head = &bytes[..bytes.len().min(MAX_FILE_BYTES)];
        debug!(source = %name, size = bytes.len(), truncated, "kb file read");
        Ok(KbFile {
            source: name,
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            truncated,
            content: String::from_utf8_lossy(head).into_owned(),
        })
    }
}
