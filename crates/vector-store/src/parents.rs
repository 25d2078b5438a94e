use crate::error::{Result, VectorStoreError};
use crate::persist::write_atomic;
use retrieval_chunker::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const PARENT_STORE_SCHEMA_VERSION: u32 = 1;

/// Parent chunks fetched for generation context; never embedded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentStore {
    parents: BTreeMap<String, Chunk>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedParentStore {
    schema_version: u32,
    parents: BTreeMap<String, Chunk>,
}

impl ParentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a saved store; a missing file is an empty store plus a warning.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, Option<String>)> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let warning = format!("parent store {} not found; starting empty", path.display());
                log::warn!("{warning}");
                return Ok((Self::new(), Some(warning)));
            }
            Err(err) => return Err(err.into()),
        };
        Ok((Self::decode(&bytes)?, None))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let persisted: PersistedParentStore = serde_json::from_slice(bytes)?;
        if persisted.schema_version != PARENT_STORE_SCHEMA_VERSION {
            return Err(VectorStoreError::corrupt(format!(
                "Unsupported parent store schema_version {} (expected {PARENT_STORE_SCHEMA_VERSION})",
                persisted.schema_version
            )));
        }
        Ok(Self {
            parents: persisted.parents,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let persisted = PersistedParentStore {
            schema_version: PARENT_STORE_SCHEMA_VERSION,
            parents: self.parents.clone(),
        };
        Ok(serde_json::to_vec_pretty(&persisted)?)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_atomic(path.as_ref(), self.encode()?).await
    }

    /// Insert or replace a parent by id
    pub fn insert(&mut self, parent: Chunk) {
        self.parents.insert(parent.id.clone(), parent);
    }

    pub fn extend(&mut self, parents: impl IntoIterator<Item = Chunk>) {
        for parent in parents {
            self.insert(parent);
        }
    }

    #[must_use]
    pub fn get(&self, parent_id: &str) -> Option<&Chunk> {
        self.parents.get(parent_id)
    }

    /// Drop every parent of `doc_id`; returns how many were removed
    pub fn remove_document(&mut self, doc_id: &str) -> usize {
        let before = self.parents.len();
        self.parents.retain(|_, parent| parent.doc_id != doc_id);
        before - self.parents.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}
