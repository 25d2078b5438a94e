use crate::error::{Result, SearchError};
use retrieval_chunker::{Chunk, Chunker};
use retrieval_vector_store::{EmbeddingProvider, StoreHandle, VectorStoreError};
use std::ops::Range;
use std::sync::Arc;

pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

/// One document to ingest
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub text: String,

    /// Fresh random id when `None`; re-ingesting the same text creates a new document
    pub doc_id: Option<String>,

    /// Provenance metadata copied onto every chunk
    pub template: Chunk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub doc_id: String,
    pub positions: Range<usize>,
    pub embedded: usize,
    pub parents: usize,
}

/// Chunk, embed, and store documents
pub struct Ingestor {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(chunker: Chunker, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            chunker,
            embedder,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn ingest(&self, handle: &StoreHandle, request: IngestRequest) -> Result<IngestReport> {
        if self.embedder.dimension() != handle.dim() {
            return Err(VectorStoreError::dimension(handle.dim(), self.embedder.dimension()).into());
        }

        let doc_id = request
            .doc_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let document = self
            .chunker
            .chunk_document(&doc_id, &request.text, &request.template)?;

        // Only leaves are embedded; parents go to the parent store as-is.
        let texts: Vec<String> = document.leaves.iter().map(|c| c.text.clone()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embedder.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(SearchError::EmbeddingCount {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }
            embeddings.extend(vectors);
        }

        let embedded = document.leaves.len();
        let parents = document.parents.len();
        let positions = {
            let (mut store, mut parent_store) = handle.write_all();
            let positions = store.add(embeddings, document.leaves)?;
            parent_store.extend(document.parents);
            positions
        };

        log::info!(
            "Ingested document {doc_id}: {embedded} chunks at {}..{}, {parents} parents",
            positions.start,
            positions.end
        );
        Ok(IngestReport {
            doc_id,
            positions,
            embedded,
            parents,
        })
    }
}
