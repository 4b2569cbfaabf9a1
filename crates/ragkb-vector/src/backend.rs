use std::path::Path;
use std::sync::Arc;
use tracing::info;

use ragkb_core::config::{BackendKind, RagSettings};
use ragkb_core::error::{Error, Result};
use ragkb_core::types::{Evidence, IndexStats, SearchRequest};
use ragkb_embed::CachedEmbedder;

use crate::remote::{RemoteVectorStore, VectorQueryClient};
use crate::search::LocalIndexSearch;
use crate::store::IndexStore;

/// Search capability selected once at start-up.
pub enum SearchBackend {
    Local(LocalIndexSearch),
    Remote(RemoteVectorStore),
}

impl SearchBackend {
    /// Build the configured backend. `base` anchors a relative index path;
    /// the remote variant needs a query client.
    pub fn from_settings(
        settings: &RagSettings,
        base: &Path,
        embedder: Arc<CachedEmbedder>,
        remote: Option<Arc<dyn VectorQueryClient>>,
    ) -> Result<Self> {
        let backend = match settings.backend {
            BackendKind::Local => {
                let store = Arc::new(IndexStore::new(settings.resolved_index_path(base)));
                SearchBackend::Local(LocalIndexSearch::new(store, embedder))
            }
            BackendKind::Remote => {
                let client = remote.ok_or_else(|| {
                    Error::InvalidConfig("backend = \"remote\" but no vector store client was provided".into())
                })?;
                SearchBackend::Remote(RemoteVectorStore::new(client, embedder))
            }
        };
        info!(backend = backend.name(), "search backend selected");
        Ok(backend)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SearchBackend::Local(_) => "local",
            SearchBackend::Remote(_) => "remote",
        }
    }

    pub fn ensure_ready(&self) -> Result<IndexStats> {
        match self {
            SearchBackend::Local(local) => local.ensure_ready(),
            SearchBackend::Remote(remote) => remote.ensure_ready(),
        }
    }

    pub fn reload(&self) -> Result<IndexStats> {
        match self {
            SearchBackend::Local(local) => local.reload(),
            SearchBackend::Remote(remote) => remote.reload(),
        }
    }

    pub fn stats(&self) -> Result<IndexStats> {
        match self {
            SearchBackend::Local(local) => local.stats(),
            SearchBackend::Remote(remote) => Ok(remote.stats()),
        }
    }

    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<Evidence>> {
        match self {
            SearchBackend::Local(local) => local.search(req).await,
            SearchBackend::Remote(remote) => remote.search(req).await,
        }
    }
}
