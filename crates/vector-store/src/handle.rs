use crate::error::Result;
use crate::index::index_from_raw;
use crate::parents::ParentStore;
use crate::persist::{self, LoadedSnapshot, SnapshotLayout};
use crate::store::VectorStore;
use crate::types::{IndexBackend, StoreStats};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared, cloneable owner of one vector store and its parent chunks.
///
/// Searches take read guards and may run concurrently; mutations take the
/// write guard. Guards are plain `std` locks and must not be held across
/// an `.await`.
///
/// When both locks are needed the store lock is taken first; use
/// [`StoreHandle::read_all`] and [`StoreHandle::write_all`] to get a view in
/// which store and parents belong to the same state.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    dim: usize,
    store: RwLock<VectorStore>,
    parents: RwLock<ParentStore>,
}

/// What a document delete touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub records: usize,
    pub parents: usize,
}

impl StoreHandle {
    pub fn new(dim: usize, backend: IndexBackend) -> Result<Self> {
        Ok(Self::from_store(VectorStore::new(dim, backend)?, ParentStore::new()))
    }

    pub fn from_store(store: VectorStore, parents: ParentStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                dim: store.dim(),
                store: RwLock::new(store),
                parents: RwLock::new(parents),
            }),
        }
    }

    /// Load the snapshot in `layout` if one exists, else start empty.
    ///
    /// Returns the handle and any degraded-load warnings.
    pub async fn open(
        layout: &SnapshotLayout,
        dim: usize,
        backend: IndexBackend,
    ) -> Result<(Self, Vec<String>)> {
        if !layout.exists() {
            log::info!(
                "No snapshot at {}; starting with an empty {} store",
                layout.index.display(),
                backend.as_str()
            );
            return Ok((Self::new(dim, backend)?, Vec::new()));
        }

        let (loaded, parents, warnings) = load_all(layout, dim).await?;
        if loaded.backend() != backend {
            log::info!(
                "Snapshot uses the {} backend; configured {} applies after the next rebuild is saved",
                loaded.backend().as_str(),
                backend.as_str()
            );
        }
        Ok((Self::from_store(loaded, parents), warnings))
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.inner.dim
    }

    pub fn read(&self) -> RwLockReadGuard<'_, VectorStore> {
        self.inner
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, VectorStore> {
        self.inner
            .store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn parents(&self) -> RwLockReadGuard<'_, ParentStore> {
        self.inner
            .parents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn parents_mut(&self) -> RwLockWriteGuard<'_, ParentStore> {
        self.inner
            .parents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Read guards on store and parents, taken in lock order
    pub fn read_all(
        &self,
    ) -> (
        RwLockReadGuard<'_, VectorStore>,
        RwLockReadGuard<'_, ParentStore>,
    ) {
        let store = self.read();
        (store, self.parents())
    }

    /// Write guards on store and parents, taken in lock order
    pub fn write_all(
        &self,
    ) -> (
        RwLockWriteGuard<'_, VectorStore>,
        RwLockWriteGuard<'_, ParentStore>,
    ) {
        let store = self.write();
        (store, self.parents_mut())
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.read().stats()
    }

    /// Soft-delete a document's records and drop its parents
    pub fn delete_document(&self, doc_id: &str) -> DeleteReport {
        let (mut store, mut parents) = self.write_all();
        DeleteReport {
            records: store.soft_delete_document(doc_id),
            parents: parents.remove_document(doc_id),
        }
    }

    /// Replace the store with its compacted rebuild; returns records removed
    pub fn compact(&self) -> usize {
        let mut store = self.write();
        let rebuilt = store.rebuild();
        let removed = store.len() - rebuilt.len();
        *store = rebuilt;
        removed
    }

    /// Same as [`StoreHandle::compact`] but switching to `backend`
    pub fn compact_into(&self, backend: IndexBackend) -> Result<usize> {
        let mut store = self.write();
        let rebuilt = store.rebuild();
        let removed = store.len() - rebuilt.len();
        *store = if rebuilt.backend() == backend {
            rebuilt
        } else {
            convert_backend(&rebuilt, backend)?
        };
        Ok(removed)
    }

    /// Persist store and parents. Both are encoded under one pair of read
    /// locks; file writes happen after they are released.
    pub async fn snapshot(&self, layout: &SnapshotLayout) -> Result<()> {
        let (encoded, parents) = {
            let (store, parents) = self.read_all();
            (persist::encode(&store)?, parents.encode()?)
        };

        persist::write_snapshot(&encoded, &layout.index, &layout.metadata).await?;
        persist::write_atomic(&layout.parents, parents).await
    }

    /// Load `layout` into staging and swap it in. On error nothing changes.
    pub async fn reload(&self, layout: &SnapshotLayout) -> Result<Vec<String>> {
        let (store, parents, warnings) = load_all(layout, self.dim()).await?;
        let (mut live_store, mut live_parents) = self.write_all();
        *live_store = store;
        *live_parents = parents;
        Ok(warnings)
    }
}

async fn load_all(
    layout: &SnapshotLayout,
    dim: usize,
) -> Result<(VectorStore, ParentStore, Vec<String>)> {
    let LoadedSnapshot {
        store,
        mut warnings,
    } = persist::load(&layout.index, &layout.metadata, dim).await?;
    let (parents, parent_warning) = ParentStore::load_or_default(&layout.parents).await?;
    warnings.extend(parent_warning);
    Ok((store, parents, warnings))
}

fn convert_backend(store: &VectorStore, backend: IndexBackend) -> Result<VectorStore> {
    let raw = store.index().raw();
    let index = index_from_raw(backend, store.dim(), &raw)?;
    Ok(VectorStore::from_parts(index, store.records().cloned().collect()))
}
