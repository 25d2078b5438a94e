use crate::error::{Result, VectorStoreError};
use crate::types::{IndexBackend, IndexStats, Neighbor};
use ndarray::{Array2, ArrayView1, Axis};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Exact similarity index over L2-normalized vectors.
///
/// Row `i` is the vector stored at position `i`; rows are only appended,
/// never removed in place. Scores are inner products, which equal cosine
/// similarity because callers normalize before `add` and `search`.
///
/// There is no `delete`: deletion is a record-state change in
/// [`VectorStore`](crate::VectorStore), and rows leave an index only through
/// [`Indexable::retain`] during a rebuild.
pub trait Indexable: Send + Sync {
    fn backend(&self) -> IndexBackend;

    fn dim(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append rows. All rows are checked before any is stored.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()>;

    /// Top `k` rows by inner product, descending, ties by ascending position
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    fn vector(&self, position: usize) -> Option<Vec<f32>>;

    /// Fresh index holding only `keep` rows, renumbered in the given order
    fn retain(&self, keep: &[usize]) -> Box<dyn Indexable>;

    /// Row-major copy of every vector, for snapshots
    fn raw(&self) -> Cow<'_, [f32]>;

    fn stats(&self) -> IndexStats {
        IndexStats {
            backend: self.backend(),
            dim: self.dim(),
            vectors: self.len(),
            bytes: self.len() * self.dim() * std::mem::size_of::<f32>(),
        }
    }
}

/// Build an empty index for `backend`
pub fn new_index(backend: IndexBackend, dim: usize) -> Result<Box<dyn Indexable>> {
    if dim == 0 {
        return Err(VectorStoreError::InvalidConfig(
            "embedding dimension must be > 0".to_string(),
        ));
    }
    Ok(match backend {
        IndexBackend::Flat => Box::new(FlatIndex::new(dim)),
        IndexBackend::Matrix => Box::new(MatrixIndex::new(dim)),
    })
}

/// Build an index for `backend` from row-major data
pub fn index_from_raw(
    backend: IndexBackend,
    dim: usize,
    data: &[f32],
) -> Result<Box<dyn Indexable>> {
    let mut index = new_index(backend, dim)?;
    if data.len() % dim != 0 {
        return Err(VectorStoreError::corrupt(format!(
            "{} floats do not divide into rows of {dim}",
            data.len()
        )));
    }
    let rows: Vec<Vec<f32>> = data.chunks_exact(dim).map(<[f32]>::to_vec).collect();
    index.add(&rows)?;
    Ok(index)
}

/// Scale `vec` to unit length in place. Zero vectors are left as-is, as are
/// vectors with non-finite components; see [`check_finite`].
pub fn normalize(vec: &mut [f32]) {
    // f64 keeps the squares of any finite f32 from overflowing or flushing to zero
    let norm = vec
        .iter()
        .map(|&v| f64::from(v) * f64::from(v))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return;
    }
    for value in vec {
        *value = (f64::from(*value) / norm) as f32;
    }
}

/// Reject vectors holding NaN or infinite components
pub fn check_finite<'a>(vectors: impl IntoIterator<Item = &'a [f32]>) -> Result<()> {
    for (i, vector) in vectors.into_iter().enumerate() {
        if let Some(bad) = vector.iter().find(|v| !v.is_finite()) {
            return Err(VectorStoreError::embedding(format!(
                "vector {i} has a non-finite component ({bad})"
            )));
        }
    }
    Ok(())
}

#[must_use]
pub fn normalized(vec: &[f32]) -> Vec<f32> {
    let mut out = vec.to_vec();
    normalize(&mut out);
    out
}

fn check_dim(expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(bad) => Err(VectorStoreError::dimension(expected, bad.len())),
        None => Ok(()),
    }
}

fn by_score_then_position(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

/// Keep the best `k` neighbors in deterministic order
fn top_k(mut scored: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    if k == 0 {
        return Vec::new();
    }
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_score_then_position);
        scored.truncate(k);
    }
    scored.sort_by(by_score_then_position);
    scored
}

/// Brute-force index over a contiguous `Vec<f32>`
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// `dim` must be non-zero; use [`new_index`] from outside the crate
    pub(crate) const fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    fn row(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }
}

impl Indexable for FlatIndex {
    fn backend(&self) -> IndexBackend {
        IndexBackend::Flat
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        check_dim(self.dim, vectors)?;
        self.data.reserve(vectors.len() * self.dim);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(VectorStoreError::dimension(self.dim, query.len()));
        }

        let scored = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, row)| Neighbor {
                score: row.iter().zip(query).map(|(a, b)| a * b).sum(),
                position,
            })
            .collect();

        Ok(top_k(scored, k))
    }

    fn vector(&self, position: usize) -> Option<Vec<f32>> {
        self.row(position).map(<[f32]>::to_vec)
    }

    fn retain(&self, keep: &[usize]) -> Box<dyn Indexable> {
        let mut data = Vec::with_capacity(keep.len() * self.dim);
        for &position in keep {
            if let Some(row) = self.row(position) {
                data.extend_from_slice(row);
            }
        }
        Box::new(Self {
            dim: self.dim,
            data,
        })
    }

    fn raw(&self) -> Cow<'_, [f32]> {
        Cow::Borrowed(&self.data)
    }
}

/// Brute-force index over an `ndarray` matrix (one row per vector)
#[derive(Debug, Clone)]
pub struct MatrixIndex {
    matrix: Array2<f32>,
}

impl MatrixIndex {
    pub(crate) fn new(dim: usize) -> Self {
        Self {
            matrix: Array2::zeros((0, dim)),
        }
    }
}

impl Indexable for MatrixIndex {
    fn backend(&self) -> IndexBackend {
        IndexBackend::Matrix
    }

    fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    fn len(&self) -> usize {
        self.matrix.nrows()
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        check_dim(self.dim(), vectors)?;
        for vector in vectors {
            self.matrix
                .push_row(ArrayView1::from(vector.as_slice()))
                .map_err(|e| VectorStoreError::corrupt(format!("matrix append failed: {e}")))?;
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim() {
            return Err(VectorStoreError::dimension(self.dim(), query.len()));
        }

        let scores = self.matrix.dot(&ArrayView1::from(query));
        let scored = scores
            .iter()
            .enumerate()
            .map(|(position, &score)| Neighbor { score, position })
            .collect();

        Ok(top_k(scored, k))
    }

    fn vector(&self, position: usize) -> Option<Vec<f32>> {
        (position < self.len()).then(|| self.matrix.row(position).to_vec())
    }

    fn retain(&self, keep: &[usize]) -> Box<dyn Indexable> {
        let keep: Vec<usize> = keep.iter().copied().filter(|&p| p < self.len()).collect();
        Box::new(Self {
            matrix: self.matrix.select(Axis(0), &keep),
        })
    }

    fn raw(&self) -> Cow<'_, [f32]> {
        match self.matrix.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.matrix.iter().copied().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backends() -> [IndexBackend; 2] {
        [IndexBackend::Flat, IndexBackend::Matrix]
    }

    #[test]
    fn test_add_and_search() {
        for backend in backends() {
            let mut index = new_index(backend, 3).unwrap();
            index
                .add(&[
                    vec![1.0, 0.0, 0.0],
                    normalized(&[0.9, 0.1, 0.0]),
                    vec![0.0, 1.0, 0.0],
                ])
                .unwrap();

            assert_eq!(index.len(), 3);

            let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
            assert_eq!(results.len(), 2);

            // First result should be position 0 (exact match)
            assert_eq!(results[0].position, 0);
            assert!((results[0].score - 1.0).abs() < 1e-6);

            // Second should be position 1 (close)
            assert_eq!(results[1].position, 1);
            assert!(results[1].score > 0.99, "{backend:?}: {}", results[1].score);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        for backend in backends() {
            let mut index = new_index(backend, 3).unwrap();
            let result = index.add(&[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
            assert!(matches!(
                result,
                Err(VectorStoreError::DimensionMismatch {
                    expected: 3,
                    actual: 2
                })
            ));
            assert_eq!(index.len(), 0, "no partial insert");

            index.add(&[vec![1.0, 0.0, 0.0]]).unwrap();
            assert!(index.search(&[1.0, 0.0], 1).is_err());
        }
    }

    #[test]
    fn ties_break_by_position() {
        for backend in backends() {
            let mut index = new_index(backend, 2).unwrap();
            index
                .add(&[vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 1.0]])
                .unwrap();
            let positions: Vec<usize> = index
                .search(&[0.0, 1.0], 3)
                .unwrap()
                .into_iter()
                .map(|n| n.position)
                .collect();
            assert_eq!(positions, vec![0, 2, 3]);
        }
    }

    #[test]
    fn empty_index_and_zero_k() {
        for backend in backends() {
            let mut index = new_index(backend, 2).unwrap();
            assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
            index.add(&[vec![1.0, 0.0]]).unwrap();
            assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
            assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 1);
        }
    }

    #[test]
    fn retain_renumbers_rows() {
        for backend in backends() {
            let mut index = new_index(backend, 2).unwrap();
            index
                .add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]])
                .unwrap();
            let compacted = index.retain(&[0, 2]);
            assert_eq!(compacted.len(), 2);
            assert_eq!(compacted.backend(), backend);
            assert_eq!(compacted.vector(1), Some(vec![-1.0, 0.0]));
            assert_eq!(compacted.raw().as_ref(), &[1.0, 0.0, -1.0, 0.0]);
        }
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(
            new_index(IndexBackend::Flat, 0),
            Err(VectorStoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn normalize_leaves_zero_vector() {
        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);

        let unit = normalized(&[3.0, 4.0]);
        assert!((unit[0] - 0.6).abs() < 1e-6);
        assert!((unit[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_handles_extreme_magnitudes() {
        for input in [[3e19f32, 4e19], [3e-30, 4e-30], [f32::MAX, f32::MAX], [1e-45, 0.0]] {
            let unit = normalized(&input);
            let norm = unit.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "{input:?} -> {unit:?}");
        }
        let unit = normalized(&[3e19, 4e19]);
        assert!((unit[0] - 0.6).abs() < 1e-6);
        assert!((unit[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn check_finite_flags_nan_and_infinity() {
        let good = [1.0f32, -2.0];
        assert!(check_finite([&good[..]]).is_ok());
        for bad in [[f32::NAN, 0.0], [0.0, f32::INFINITY], [f32::NEG_INFINITY, 1.0]] {
            assert!(matches!(
                check_finite([&good[..], &bad[..]]),
                Err(VectorStoreError::EmbeddingError(msg)) if msg.starts_with("vector 1")
            ));
        }
    }

    #[test]
    fn index_from_raw_rejects_ragged_data() {
        assert!(index_from_raw(IndexBackend::Flat, 3, &[1.0; 4]).is_err());
        let index = index_from_raw(IndexBackend::Matrix, 2, &[1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(index.len(), 2);
    }
}
