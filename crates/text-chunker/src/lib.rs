//! # Retrieval Chunker
//!
//! Deterministic, stateless character-window segmentation for semantic retrieval.
//!
//! Chunk boundaries are pure character offsets with no sentence or token
//! awareness. Downstream reranking assumes these exact boundaries, so they are
//! part of the retrieval contract.
//!
//! ## Tiers
//!
//! ```text
//! Document text
//!     │
//!     ├──> Flat:         window(size, overlap)            → embedded chunks
//!     │
//!     └──> Parent/child: window(parent_size, parent_overlap) → parents (never embedded)
//!                            └─> window(size, overlap)       → children (embedded)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use retrieval_chunker::chunk;
//!
//! let text = "x".repeat(2500);
//! let windows = chunk(&text, 1000, 200).unwrap();
//! assert_eq!(windows.len(), 3);
//! assert_eq!(windows[2].len(), 900);
//! ```

mod chunker;
mod config;
mod error;
mod types;

pub use chunker::{chunk, chunk_parent_child, chunk_spans, Chunker};
pub use config::{ChunkerConfig, ChunkingStrategy};
pub use error::{ChunkerError, Result};
pub use types::{Chunk, ChunkSpan, ChunkedDocument, ContentType, ParentChildChunks};
