use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use ragkb_core::error::Result;
use ragkb_core::types::IndexStats;

use crate::snapshot::VectorIndex;

/// Owner of the loaded index snapshot.
///
/// Readers clone the current `Arc` and keep it for the whole request; reload
/// builds a complete new snapshot and swaps the pointer, so nobody observes a
/// half-updated index. Loads are serialized so concurrent first searches read
/// the artifact once.
pub struct IndexStore {
    path: PathBuf,
    current: RwLock<Option<Arc<VectorIndex>>>,
    loading: Mutex<()>,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), current: RwLock::new(None), loading: Mutex::new(()) }
    }

    /// Start from an already built snapshot (tests, embedded use).
    pub fn with_snapshot(path: impl Into<PathBuf>, index: VectorIndex) -> Self {
        Self { path: path.into(), current: RwLock::new(Some(Arc::new(index))), loading: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the artifact from disk without installing it.
    pub fn load(&self) -> Result<Arc<VectorIndex>> {
        let index = VectorIndex::read(&self.path)?;
        info!(path = %self.path.display(), model = index.model(), dim = index.dim(), docs = index.len(), "vector index loaded");
        Ok(Arc::new(index))
    }

    /// Current snapshot, loading it on first use.
    pub fn ensure(&self) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.current.read().as_ref() {
            return Ok(Arc::clone(index));
        }
        let _guard = self.loading.lock();
        if let Some(index) = self.current.read().as_ref() {
            return Ok(Arc::clone(index));
        }
        let fresh = self.load()?;
        *self.current.write() = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Drop the cached snapshot and load the artifact again.
    ///
    /// If the artifact can no longer be read the store is left empty and the
    /// error is returned; requests already holding the old snapshot finish on it.
    pub fn reload(&self) -> Result<Arc<VectorIndex>> {
        let _guard = self.loading.lock();
        self.current.write().take();
        let fresh = self.load()?;
        *self.current.write() = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let index = self.ensure()?;
        Ok(self.describe(&index))
    }

    pub fn describe(&self, index: &VectorIndex) -> IndexStats {
        IndexStats {
            backend: "local".to_string(),
            model: Some(index.model().to_string()),
            dim: Some(index.dim()),
            doc_count: Some(index.docs().len()),
            vector_count: Some(index.vectors().len()),
            created_at: index.created_at(),
            path: Some(self.path.display().to_string()),
        }
    }
}
