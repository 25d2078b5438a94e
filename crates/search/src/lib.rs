//! # Retrieval Search
//!
//! The externally facing search contract over a [`retrieval_vector_store::VectorStore`]:
//! similarity search with equality filters and soft-delete exclusion,
//! metadata-boost reranking, parent context expansion, and the ingestion
//! pipeline that feeds the store.
//!
//! ```
//! use retrieval_search::{Filters, Retriever};
//! use retrieval_vector_store::{Chunk, IndexBackend, VectorStore};
//!
//! let mut store = VectorStore::new(2, IndexBackend::Flat)?;
//! store.add(
//!     vec![vec![1.0, 0.0], vec![0.0, 1.0]],
//!     vec![
//!         Chunk::new("a", "doc", "alpha").with_meta("province", "ON"),
//!         Chunk::new("b", "doc", "beta").with_meta("province", "BC"),
//!     ],
//! )?;
//!
//! let retriever = Retriever::default();
//! let hits = retriever.search(&store, &[1.0, 1.0], 2, &Filters::new().hard("province", "BC"))?;
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].chunk_id, "b");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod error;
mod filters;
mod ingest;
mod rerank;
mod retriever;
mod types;

pub use config::{RerankBoosts, SearchConfig};
pub use error::{Result, SearchError};
pub use filters::Filters;
pub use ingest::{IngestReport, IngestRequest, Ingestor, DEFAULT_EMBED_BATCH_SIZE};
pub use retriever::Retriever;
pub use types::{ContextBlock, SearchResult};
