use retrieval_chunker::Chunk;
use serde::{Deserialize, Serialize};

/// Lifecycle of a stored record.
///
/// Soft-deleted records keep their vector in the index until the next rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    #[default]
    Active,
    SoftDeleted,
}

/// One slot of the append-only store.
///
/// The embedding itself lives in the index row with the same position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorRecord {
    pub position: usize,

    /// `None` only after a degraded load that found no metadata file
    pub chunk: Option<Chunk>,

    pub state: RecordState,
}

impl VectorRecord {
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self.state, RecordState::SoftDeleted)
    }

    /// Active and backed by chunk metadata
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self.state, RecordState::Active) && self.chunk.is_some()
    }
}

/// A scored index hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
    pub position: usize,
}

/// Which exact-search implementation backs the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// Contiguous row-major buffer with scalar dot products
    #[default]
    Flat,
    /// `ndarray` matrix, scored with one matrix-vector product
    Matrix,
}

impl IndexBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Matrix => "matrix",
        }
    }
}

impl std::str::FromStr for IndexBackend {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "matrix" => Ok(Self::Matrix),
            other => Err(format!(
                "Unsupported index backend '{other}' (expected 'flat' or 'matrix')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub backend: IndexBackend,
    pub dim: usize,
    pub vectors: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub index: IndexStats,
    pub records: usize,
    pub active: usize,
    pub soft_deleted: usize,
    /// Records without chunk metadata (degraded load)
    pub detached: usize,
    /// Distinct documents among live records
    pub documents: usize,
}
