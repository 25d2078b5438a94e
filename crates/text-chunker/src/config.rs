use serde::{Deserialize, Serialize};

/// Configuration for text chunking behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Single-tier or parent/child segmentation
    pub strategy: ChunkingStrategy,

    /// Window width in characters (flat chunks, or children in parent/child mode)
    pub chunk_size: usize,

    /// Characters shared between consecutive windows
    pub chunk_overlap: usize,

    /// Parent window width in characters (parent/child mode only)
    pub parent_size: usize,

    /// Characters shared between consecutive parents (parent/child mode only)
    pub parent_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Flat,
            chunk_size: 1000,
            chunk_overlap: 200,
            parent_size: 2000,
            parent_overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// Flat windows sized for embedding models
    pub fn for_embeddings() -> Self {
        Self::default()
    }

    /// Small children for precise matching, large parents for generation context
    pub fn hierarchical() -> Self {
        Self {
            strategy: ChunkingStrategy::ParentChild,
            chunk_size: 400,
            chunk_overlap: 50,
            parent_size: 2000,
            parent_overlap: 200,
        }
    }

    /// Validate configuration
    ///
    /// `overlap >= size` is accepted: it is the documented single-window case.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.strategy == ChunkingStrategy::ParentChild && self.parent_size == 0 {
            return Err("parent_size must be > 0".to_string());
        }

        Ok(())
    }
}

/// Strategy for segmenting a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// One tier of overlapping windows, every chunk embedded
    #[default]
    Flat,

    /// Parent windows split again into embedded children
    ParentChild,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ChunkerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_configs_valid() {
        assert!(ChunkerConfig::for_embeddings().validate().is_ok());
        assert!(ChunkerConfig::hierarchical().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ChunkerConfig::default();

        config.chunk_size = 0;
        assert!(config.validate().is_err());

        config.chunk_size = 100;
        config.chunk_overlap = 500;
        assert!(config.validate().is_ok(), "degenerate overlap is allowed");

        config.strategy = ChunkingStrategy::ParentChild;
        config.parent_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ChunkerConfig =
            serde_json::from_str(r#"{"strategy":"parent_child","chunk_size":300}"#)
                .expect("parse config");
        assert_eq!(config.strategy, ChunkingStrategy::ParentChild);
        assert_eq!(config.chunk_size, 300);
        assert_eq!(config.chunk_overlap, 200);
    }
}
