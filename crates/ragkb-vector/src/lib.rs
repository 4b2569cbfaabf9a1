//! Vector index snapshot, exhaustive cosine search and the search backends.

pub mod backend;
pub mod merge;
pub mod mmr;
pub mod remote;
pub mod search;
pub mod similarity;
pub mod snapshot;
pub mod store;

pub use backend::SearchBackend;
pub use remote::{RemoteMatch, RemoteVectorStore, VectorQueryClient};
pub use search::{search_vectors, LocalIndexSearch};
pub use snapshot::{IndexArtifact, VectorIndex};
pub use store::IndexStore;
