//! # Retrieval Vector Store
//!
//! Append-only record store with exact cosine similarity search, snapshot
//! persistence, and a parent-chunk store for context expansion.
//!
//! ## Architecture
//!
//! ```text
//! Chunk[] + embeddings
//!     │
//!     ├──> VectorStore (records, lockstep with index rows)
//!     │      └─> Indexable: FlatIndex | MatrixIndex
//!     │
//!     ├──> ParentStore (parent chunks, never embedded)
//!     │
//!     └──> persist (index.rvx + metadata.jsonl + parents.json)
//! ```
//!
//! ## Example
//!
//! ```
//! use retrieval_vector_store::{Chunk, IndexBackend, VectorStore};
//!
//! let mut store = VectorStore::new(3, IndexBackend::Flat)?;
//! store.add(
//!     vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
//!     vec![Chunk::new("a", "doc", "alpha"), Chunk::new("b", "doc", "beta")],
//! )?;
//!
//! let hits = store.search(&[0.9, 0.1, 0.0], 1)?;
//! assert_eq!(hits[0].position, 0);
//! # Ok::<(), retrieval_vector_store::VectorStoreError>(())
//! ```

mod embeddings;
mod error;
mod handle;
mod index;
mod parents;
pub mod persist;
mod store;
mod types;

pub use embeddings::{EmbeddingProvider, HashEmbedder};
pub use error::{Result, VectorStoreError};
pub use handle::{DeleteReport, StoreHandle};
pub use index::{
    check_finite, index_from_raw, new_index, normalize, normalized, FlatIndex, Indexable,
    MatrixIndex,
};
pub use parents::{ParentStore, PARENT_STORE_SCHEMA_VERSION};
pub use persist::{LoadedSnapshot, SnapshotLayout};
pub use store::VectorStore;
pub use types::{IndexBackend, IndexStats, Neighbor, RecordState, StoreStats, VectorRecord};

// Re-export chunk types for convenience
pub use retrieval_chunker::{Chunk, ContentType};
