use anyhow::{anyhow, Context, Result};
use retrieval_chunker::ChunkerConfig;
use retrieval_search::SearchConfig;
use retrieval_vector_store::{IndexBackend, SnapshotLayout};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "retrieval.toml";

const ENV_DIM: &str = "RETRIEVAL_DIM";
const ENV_DATA_DIR: &str = "RETRIEVAL_DATA_DIR";
const ENV_BACKEND: &str = "RETRIEVAL_INDEX_BACKEND";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub chunking: ChunkerConfig,
    pub store: StoreConfig,
    pub search: SearchConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Embedding dimension; fixed for the lifetime of a store
    pub dim: usize,
    pub backend: IndexBackend,
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dim: 384,
            backend: IndexBackend::Flat,
            data_dir: PathBuf::from(".retrieval"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// Deterministic hash vectors, no model required
    #[default]
    Stub,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Stub,
            batch_size: retrieval_search::DEFAULT_EMBED_BATCH_SIZE,
        }
    }
}

impl RetrievalConfig {
    /// Load from `path`, else `retrieval.toml` in the working directory if
    /// present, else defaults; then apply env overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load_from(default)?
                } else {
                    Self::default()
                }
            }
        };
        config
            .apply_overrides(|key| std::env::var(key).ok())
            .map_err(|e| anyhow!(e))?;
        config.validate().map_err(|e| anyhow!("Invalid config: {e}"))?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `RETRIEVAL_*` overrides read through `var`
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), String> {
        if let Some(raw) = var(ENV_DIM) {
            self.store.dim = raw
                .trim()
                .parse()
                .map_err(|_| format!("{ENV_DIM} must be a positive integer, got '{raw}'"))?;
        }
        if let Some(raw) = var(ENV_DATA_DIR) {
            self.store.data_dir = PathBuf::from(raw);
        }
        if let Some(raw) = var(ENV_BACKEND) {
            self.store.backend = raw.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.store.dim == 0 {
            return Err("store.dim must be > 0".to_string());
        }
        if self.embedding.batch_size == 0 {
            return Err("embedding.batch_size must be > 0".to_string());
        }
        self.chunking
            .validate()
            .map_err(|e| format!("chunking: {e}"))?;
        self.search.validate().map_err(|e| format!("search: {e}"))?;
        Ok(())
    }

    #[must_use]
    pub fn layout(&self) -> SnapshotLayout {
        SnapshotLayout::in_dir(&self.store.data_dir)
    }
}
