//! Snapshot persistence: a binary index file plus a JSON Lines metadata file.
//!
//! Index file layout (little-endian):
//!
//! ```text
//! magic "RVX1" | u32 dim | u64 count | u8 backend | u64 snapshot_id | count*dim f32
//! ```
//!
//! The metadata file starts with a header line carrying the same record
//! count and snapshot id, followed by one line per record in position order.
//! Both files are written to temp siblings and renamed metadata first. The
//! previous metadata file is kept as a `.bak` sibling until the index rename
//! succeeds and is restored if it fails. A crash between the two renames
//! leaves files whose headers disagree, which [`load`] reports as
//! [`VectorStoreError::SnapshotMismatch`].

use crate::error::{Result, VectorStoreError};
use crate::index::index_from_raw;
use crate::store::VectorStore;
use crate::types::{IndexBackend, RecordState, VectorRecord};
use retrieval_chunker::Chunk;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const INDEX_MAGIC: &[u8; 4] = b"RVX1";
pub const METADATA_SCHEMA_VERSION: u32 = 1;

const INDEX_FILE: &str = "index.rvx";
const METADATA_FILE: &str = "metadata.jsonl";
const PARENTS_FILE: &str = "parents.json";

/// File locations of one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLayout {
    pub index: PathBuf,
    pub metadata: PathBuf,
    pub parents: PathBuf,
}

impl SnapshotLayout {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            index: dir.join(INDEX_FILE),
            metadata: dir.join(METADATA_FILE),
            parents: dir.join(PARENTS_FILE),
        }
    }

    /// A snapshot is present once its index file exists
    #[must_use]
    pub fn exists(&self) -> bool {
        self.index.exists()
    }
}

/// Result of [`load`]: the restored store and any degradation notes
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub store: VectorStore,
    pub warnings: Vec<String>,
}

impl LoadedSnapshot {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Serialized bytes of both snapshot files, ready to be written
#[derive(Debug, Clone)]
pub struct EncodedSnapshot {
    pub snapshot_id: u64,
    pub records: usize,
    index: Vec<u8>,
    metadata: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataHeader {
    schema_version: u32,
    records: usize,
    dim: usize,
    snapshot_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataLine {
    position: usize,
    deleted: bool,
    chunk: Chunk,
}

struct IndexHeader {
    dim: usize,
    count: usize,
    backend: IndexBackend,
    snapshot_id: u64,
}

/// Serialize `store` into snapshot bytes. Pure CPU work; no I/O.
pub fn encode(store: &VectorStore) -> Result<EncodedSnapshot> {
    let snapshot_id = new_snapshot_id();
    let index = store.index();
    let raw = index.raw();
    let dim = u32::try_from(store.dim()).map_err(|_| {
        VectorStoreError::InvalidConfig(format!(
            "dimension {} does not fit the index header",
            store.dim()
        ))
    })?;

    let mut index_bytes = Vec::with_capacity(25 + raw.len() * 4);
    index_bytes.extend_from_slice(INDEX_MAGIC);
    index_bytes.extend_from_slice(&dim.to_le_bytes());
    index_bytes.extend_from_slice(&(index.len() as u64).to_le_bytes());
    index_bytes.push(backend_tag(store.backend()));
    index_bytes.extend_from_slice(&snapshot_id.to_le_bytes());
    for value in raw.iter() {
        index_bytes.extend_from_slice(&value.to_le_bytes());
    }

    let header = MetadataHeader {
        schema_version: METADATA_SCHEMA_VERSION,
        records: store.len(),
        dim: store.dim(),
        snapshot_id,
    };
    let mut metadata = serde_json::to_vec(&header)?;
    metadata.push(b'\n');
    for record in store.records() {
        // Detached records have nothing to persist; they are written back
        // without a metadata line and stay detached on the next load.
        let Some(chunk) = &record.chunk else {
            continue;
        };
        let line = MetadataLine {
            position: record.position,
            deleted: record.is_deleted(),
            chunk: chunk.clone(),
        };
        serde_json::to_writer(&mut metadata, &line)?;
        metadata.push(b'\n');
    }

    Ok(EncodedSnapshot {
        snapshot_id,
        records: store.len(),
        index: index_bytes,
        metadata,
    })
}

/// Write both files through temp siblings: metadata renamed first, index second.
///
/// If either rename fails the previous metadata file is moved back and the
/// temp files are removed, so the previous snapshot still loads. Only a
/// process crash between the two renames can leave a mismatched pair.
pub async fn write_snapshot(
    encoded: &EncodedSnapshot,
    index_path: &Path,
    metadata_path: &Path,
) -> Result<()> {
    let index_tmp = sibling(index_path, "tmp");
    let metadata_tmp = sibling(metadata_path, "tmp");
    let metadata_bak = sibling(metadata_path, "bak");

    let staged = async {
        for path in [index_path, metadata_path] {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&metadata_tmp, &encoded.metadata).await?;
        tokio::fs::write(&index_tmp, &encoded.index).await?;
        match tokio::fs::rename(metadata_path, &metadata_bak).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
    .await;
    let had_previous = match staged {
        Ok(had_previous) => had_previous,
        Err(err) => {
            remove_quietly(&[&metadata_tmp, &index_tmp]).await;
            return Err(err.into());
        }
    };

    let committed = async {
        tokio::fs::rename(&metadata_tmp, metadata_path).await?;
        tokio::fs::rename(&index_tmp, index_path).await
    }
    .await;
    if let Err(err) = committed {
        restore_metadata(metadata_path, &metadata_bak, had_previous).await;
        remove_quietly(&[&metadata_tmp, &index_tmp]).await;
        return Err(err.into());
    }
    if had_previous {
        remove_quietly(&[&metadata_bak]).await;
    }

    log::info!(
        "Saved snapshot {:016x} ({} records) to {}",
        encoded.snapshot_id,
        encoded.records,
        index_path.display()
    );
    Ok(())
}

/// Persist `store` to `index_path` and `metadata_path`
pub async fn save(store: &VectorStore, index_path: &Path, metadata_path: &Path) -> Result<()> {
    let encoded = encode(store)?;
    write_snapshot(&encoded, index_path, metadata_path).await
}

/// Restore a store from disk into a fresh (staging) instance.
///
/// A missing metadata file is a degraded load, reported in
/// [`LoadedSnapshot::warnings`]. A missing index file is an I/O error.
pub async fn load(
    index_path: &Path,
    metadata_path: &Path,
    expected_dim: usize,
) -> Result<LoadedSnapshot> {
    let index_bytes = tokio::fs::read(index_path).await?;
    let metadata_bytes = match tokio::fs::read(metadata_path).await {
        Ok(bytes) => Some(bytes),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => return Err(err.into()),
    };

    let loaded = decode(&index_bytes, metadata_bytes.as_deref(), expected_dim)?;
    for warning in &loaded.warnings {
        log::warn!("{warning} ({})", metadata_path.display());
    }
    log::info!(
        "Loaded {} records (dim {}, {} backend) from {}",
        loaded.store.len(),
        loaded.store.dim(),
        loaded.store.backend().as_str(),
        index_path.display()
    );
    Ok(loaded)
}

/// Rebuild a store from snapshot bytes; `metadata` is `None` when the file is absent
pub fn decode(index: &[u8], metadata: Option<&[u8]>, expected_dim: usize) -> Result<LoadedSnapshot> {
    let mut cursor = Cursor::new(index);
    let header = read_index_header(&mut cursor)?;
    if header.dim != expected_dim {
        return Err(VectorStoreError::dimension(expected_dim, header.dim));
    }

    if header.dim == 0 {
        return Err(VectorStoreError::corrupt("index header has dimension 0"));
    }

    // Checked before anything is sized by `count`
    let payload_bytes = header
        .count
        .checked_mul(header.dim)
        .and_then(|floats| floats.checked_mul(std::mem::size_of::<f32>()))
        .ok_or_else(|| {
            VectorStoreError::corrupt(format!("vector count {} overflows", header.count))
        })?;
    let payload = &index[cursor.position() as usize..];
    if payload.len() != payload_bytes {
        return Err(VectorStoreError::corrupt(format!(
            "index payload is {} bytes, expected {payload_bytes} for {} vectors",
            payload.len(),
            header.count
        )));
    }
    let data: Vec<f32> = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    if data.iter().any(|v| !v.is_finite()) {
        return Err(VectorStoreError::corrupt("index holds non-finite values"));
    }
    let restored = index_from_raw(header.backend, header.dim, &data)?;

    let mut warnings = Vec::new();
    let records = match metadata {
        Some(bytes) => read_metadata(bytes, &header)?,
        None => {
            warnings.push(format!(
                "metadata file missing; {} records restored without chunk metadata",
                header.count
            ));
            detached_records(0..header.count)
        }
    };

    Ok(LoadedSnapshot {
        store: VectorStore::from_parts(restored, records),
        warnings,
    })
}

fn read_index_header(cursor: &mut Cursor<&[u8]>) -> Result<IndexHeader> {
    let mut magic = [0u8; 4];
    read_exact(cursor, &mut magic)?;
    if &magic != INDEX_MAGIC {
        return Err(VectorStoreError::corrupt("bad index magic"));
    }
    let dim = read_u32(cursor)? as usize;
    let count = usize::try_from(read_u64(cursor)?)
        .map_err(|_| VectorStoreError::corrupt("vector count does not fit in memory"))?;
    let backend = backend_from_tag(read_u8(cursor)?)?;
    let snapshot_id = read_u64(cursor)?;
    Ok(IndexHeader {
        dim,
        count,
        backend,
        snapshot_id,
    })
}

fn read_metadata(bytes: &[u8], index: &IndexHeader) -> Result<Vec<VectorRecord>> {
    let mut lines = bytes
        .split(|&b| b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace));

    let header_line = lines
        .next()
        .ok_or_else(|| VectorStoreError::corrupt("metadata file is empty"))?;
    let header: MetadataHeader = serde_json::from_slice(header_line)?;
    if header.schema_version != METADATA_SCHEMA_VERSION {
        return Err(VectorStoreError::corrupt(format!(
            "Unsupported metadata schema_version {} (expected {METADATA_SCHEMA_VERSION})",
            header.schema_version
        )));
    }
    if header.records != index.count || header.snapshot_id != index.snapshot_id {
        return Err(VectorStoreError::SnapshotMismatch {
            index_records: index.count,
            metadata_records: header.records,
        });
    }
    if header.dim != index.dim {
        return Err(VectorStoreError::dimension(index.dim, header.dim));
    }

    let mut records = detached_records(0..index.count);
    for line in lines {
        let line: MetadataLine = serde_json::from_slice(line)?;
        let slot = records.get_mut(line.position).ok_or_else(|| {
            VectorStoreError::corrupt(format!(
                "metadata position {} beyond {} indexed vectors",
                line.position, index.count
            ))
        })?;
        if slot.chunk.is_some() {
            return Err(VectorStoreError::corrupt(format!(
                "duplicate metadata for position {}",
                line.position
            )));
        }
        slot.chunk = Some(line.chunk);
        slot.state = if line.deleted {
            RecordState::SoftDeleted
        } else {
            RecordState::Active
        };
    }
    Ok(records)
}

fn detached_records(positions: std::ops::Range<usize>) -> Vec<VectorRecord> {
    positions
        .map(|position| VectorRecord {
            position,
            chunk: None,
            state: RecordState::Active,
        })
        .collect()
}

/// Write `bytes` to `path` via a temp sibling and rename
pub(crate) async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = sibling(path, "tmp");
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        remove_quietly(&[&tmp]).await;
        return Err(err.into());
    }
    Ok(())
}

/// Put the pre-save metadata file back, or drop the new one if there was none
async fn restore_metadata(path: &Path, backup: &Path, had_previous: bool) {
    let restored = if had_previous {
        tokio::fs::rename(backup, path).await
    } else {
        match tokio::fs::remove_file(path).await {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    };
    if let Err(err) = restored {
        log::error!(
            "Failed to restore previous metadata at {}: {err}",
            path.display()
        );
    }
}

async fn remove_quietly(paths: &[&Path]) {
    for path in paths {
        let _ = tokio::fs::remove_file(path).await;
    }
}

/// `path` with `.{ext}` appended to its file name
fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

fn new_snapshot_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

const fn backend_tag(backend: IndexBackend) -> u8 {
    match backend {
        IndexBackend::Flat => 0,
        IndexBackend::Matrix => 1,
    }
}

fn backend_from_tag(tag: u8) -> Result<IndexBackend> {
    match tag {
        0 => Ok(IndexBackend::Flat),
        1 => Ok(IndexBackend::Matrix),
        other => Err(VectorStoreError::corrupt(format!(
            "unknown index backend tag {other}"
        ))),
    }
}

// ===== Low-level reading helpers =====

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8]) -> Result<()> {
    cursor
        .read_exact(buf)
        .map_err(|_| VectorStoreError::corrupt("index header is truncated"))
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_exact(cursor, &mut buf)?;
    Ok(buf[0])
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(cursor, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(cursor, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
