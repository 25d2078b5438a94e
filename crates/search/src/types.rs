use retrieval_chunker::Chunk;
use serde::Serialize;

/// One ranked, filtered hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Ranking score: cosine similarity, plus boosts after reranking (capped at 1.0)
    pub score: f32,

    /// Raw cosine similarity from the index
    pub similarity: f32,

    pub content: String,

    pub metadata: Chunk,

    pub chunk_id: String,

    /// Store position at query time; changes after a rebuild
    pub position: usize,
}

/// A block of generation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextBlock {
    /// Parent id when expanded, otherwise the hit's own chunk id
    pub id: String,

    pub text: String,

    /// `true` when `text` is the enclosing parent chunk
    pub expanded: bool,

    /// Result chunks this block covers, in result order
    pub chunk_ids: Vec<String>,
}
