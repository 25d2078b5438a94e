use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] retrieval_vector_store::VectorStoreError),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] retrieval_chunker::ChunkerError),

    #[error("Embedding provider returned {actual} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, actual: usize },

    #[error("Invalid search configuration: {0}")]
    InvalidConfig(String),
}
