use crate::error::{Result, VectorStoreError};
use crate::index::{check_finite, new_index, normalize, normalized, Indexable};
use crate::types::{IndexBackend, Neighbor, RecordState, StoreStats, VectorRecord};
use retrieval_chunker::Chunk;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;

/// Append-only, position-addressed store of (normalized embedding, chunk) pairs.
///
/// Record `i` and index row `i` always describe the same entry; every
/// mutation keeps the two in lockstep.
pub struct VectorStore {
    dim: usize,
    records: Vec<VectorRecord>,
    index: Box<dyn Indexable>,
    by_chunk_id: HashMap<String, Vec<usize>>,
}

impl fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("dim", &self.dim)
            .field("backend", &self.index.backend())
            .field("records", &self.records.len())
            .finish()
    }
}

impl VectorStore {
    pub fn new(dim: usize, backend: IndexBackend) -> Result<Self> {
        Ok(Self::from_parts(new_index(backend, dim)?, Vec::new()))
    }

    /// Assemble a store from an index and its records.
    ///
    /// # Panics
    ///
    /// If the record count differs from the index row count or positions are
    /// not `0..n`. Callers validate snapshot data before getting here.
    pub(crate) fn from_parts(index: Box<dyn Indexable>, records: Vec<VectorRecord>) -> Self {
        assert_eq!(
            records.len(),
            index.len(),
            "record/index lockstep broken while assembling store"
        );
        assert!(
            records.iter().enumerate().all(|(i, r)| r.position == i),
            "record positions must be sequential"
        );

        let mut by_chunk_id: HashMap<String, Vec<usize>> = HashMap::new();
        for record in &records {
            if let Some(chunk) = &record.chunk {
                by_chunk_id
                    .entry(chunk.id.clone())
                    .or_default()
                    .push(record.position);
            }
        }

        Self {
            dim: index.dim(),
            records,
            index,
            by_chunk_id,
        }
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn backend(&self) -> IndexBackend {
        self.index.backend()
    }

    /// Total records, including soft-deleted ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append embeddings with their chunks and return the assigned positions.
    ///
    /// Every embedding is validated before anything is stored, so a
    /// `DimensionMismatch` or non-finite component leaves the store unchanged.
    pub fn add(&mut self, embeddings: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<Range<usize>> {
        if embeddings.len() != chunks.len() {
            return Err(VectorStoreError::LengthMismatch {
                embeddings: embeddings.len(),
                chunks: chunks.len(),
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dim) {
            return Err(VectorStoreError::dimension(self.dim, bad.len()));
        }
        check_finite(embeddings.iter().map(Vec::as_slice))?;

        let start = self.records.len();
        let mut embeddings = embeddings;
        for embedding in &mut embeddings {
            normalize(embedding);
        }
        self.index.add(&embeddings)?;

        for (offset, chunk) in chunks.into_iter().enumerate() {
            let position = start + offset;
            self.by_chunk_id
                .entry(chunk.id.clone())
                .or_default()
                .push(position);
            self.records.push(VectorRecord {
                position,
                chunk: Some(chunk),
                state: RecordState::Active,
            });
        }
        self.check_lockstep();

        log::debug!(
            "Added {} records at positions {start}..{}",
            self.records.len() - start,
            self.records.len()
        );
        Ok(start..self.records.len())
    }

    /// Exact cosine search over every stored vector, soft-deleted ones included.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(VectorStoreError::dimension(self.dim, query.len()));
        }
        check_finite([query])?;
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.index.search(&normalized(query), k)
    }

    #[must_use]
    pub fn record(&self, position: usize) -> Option<&VectorRecord> {
        self.records.get(position)
    }

    /// The single read-path filter: active records with chunk metadata only
    #[must_use]
    pub fn live_record(&self, position: usize) -> Option<&VectorRecord> {
        self.records.get(position).filter(|r| r.is_live())
    }

    pub fn records(&self) -> impl Iterator<Item = &VectorRecord> {
        self.records.iter()
    }

    /// Stored (normalized) embedding at `position`
    #[must_use]
    pub fn embedding(&self, position: usize) -> Option<Vec<f32>> {
        self.index.vector(position)
    }

    #[must_use]
    pub fn positions_for_chunk(&self, chunk_id: &str) -> &[usize] {
        self.by_chunk_id
            .get(chunk_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First live chunk with this id
    #[must_use]
    pub fn chunk_by_id(&self, chunk_id: &str) -> Option<&Chunk> {
        self.positions_for_chunk(chunk_id)
            .iter()
            .find_map(|&p| self.live_record(p))
            .and_then(|r| r.chunk.as_ref())
    }

    /// Mark one record deleted. Returns `false` if it was missing or already deleted.
    pub fn soft_delete(&mut self, position: usize) -> bool {
        match self.records.get_mut(position) {
            Some(record) if record.state == RecordState::Active => {
                record.state = RecordState::SoftDeleted;
                true
            }
            _ => false,
        }
    }

    /// Mark every record carrying `chunk_id` deleted; returns how many changed
    pub fn soft_delete_by_chunk_id(&mut self, chunk_id: &str) -> usize {
        let positions = self.positions_for_chunk(chunk_id).to_vec();
        positions
            .into_iter()
            .filter(|&p| self.soft_delete(p))
            .count()
    }

    /// Cascade a document delete to all of its chunks
    pub fn soft_delete_document(&mut self, doc_id: &str) -> usize {
        let mut changed = 0;
        for record in &mut self.records {
            let owned = record.chunk.as_ref().is_some_and(|c| c.doc_id == doc_id);
            if owned && record.state == RecordState::Active {
                record.state = RecordState::SoftDeleted;
                changed += 1;
            }
        }
        if changed > 0 {
            log::info!("Soft-deleted {changed} records of document {doc_id}");
        }
        changed
    }

    /// Compacted copy: live records only, renumbered from 0 in original order.
    ///
    /// Records without chunk metadata cannot be served and are dropped too.
    #[must_use]
    pub fn rebuild(&self) -> Self {
        let keep: Vec<usize> = self
            .records
            .iter()
            .filter(|r| r.is_live())
            .map(|r| r.position)
            .collect();

        let index = self.index.retain(&keep);
        let records = keep
            .iter()
            .enumerate()
            .map(|(position, &old)| VectorRecord {
                position,
                chunk: self.records[old].chunk.clone(),
                state: RecordState::Active,
            })
            .collect();

        let rebuilt = Self::from_parts(index, records);
        log::info!(
            "Rebuilt store: {} -> {} records",
            self.records.len(),
            rebuilt.len()
        );
        rebuilt
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let mut active = 0;
        let mut soft_deleted = 0;
        let mut detached = 0;
        let mut documents = HashSet::new();
        for record in &self.records {
            match (&record.chunk, record.state) {
                (None, _) => detached += 1,
                (Some(_), RecordState::SoftDeleted) => soft_deleted += 1,
                (Some(chunk), RecordState::Active) => {
                    active += 1;
                    documents.insert(chunk.doc_id.as_str());
                }
            }
        }

        StoreStats {
            index: self.index.stats(),
            records: self.records.len(),
            active,
            soft_deleted,
            detached,
            documents: documents.len(),
        }
    }

    pub(crate) fn index(&self) -> &dyn Indexable {
        self.index.as_ref()
    }

    fn check_lockstep(&self) {
        assert_eq!(
            self.records.len(),
            self.index.len(),
            "record/index lockstep broken"
        );
    }
}
