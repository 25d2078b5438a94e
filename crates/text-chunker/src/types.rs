use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bounded span of source text treated as one retrieval unit
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identifier, unique within a document
    pub id: String,

    /// The indexed content
    pub text: String,

    /// Enclosing parent chunk (`None` for parents and flat chunks)
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Owning document
    pub doc_id: String,

    /// Original file or source label
    #[serde(default)]
    pub source_name: Option<String>,

    #[serde(default)]
    pub page: Option<String>,

    #[serde(default)]
    pub organization: Option<String>,

    #[serde(default)]
    pub subject: Option<String>,

    /// What the text was derived from
    #[serde(default)]
    pub content_type: ContentType,

    /// Additional equality-filterable metadata (offence_number, jurisdiction, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Chunk {
    /// Create a chunk with the mandatory fields only
    pub fn new(id: impl Into<String>, doc_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_id: doc_id.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    /// Builder: set parent id
    #[must_use]
    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Builder: set source name
    #[must_use]
    pub fn source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    /// Builder: set content type
    #[must_use]
    pub const fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Builder: add an extra metadata pair
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Whether this chunk is a top-level (parent or flat) chunk
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Resolve a metadata key to its value.
    ///
    /// Typed fields win over `extra`, so `extra["doc_id"]` can never shadow
    /// the real document id.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        match key {
            "id" | "chunk_id" => Some(self.id.as_str()),
            "doc_id" => Some(self.doc_id.as_str()),
            "parent_id" => self.parent_id.as_deref(),
            "source_name" => self.source_name.as_deref(),
            "page" => self.page.as_deref(),
            "organization" => self.organization.as_deref(),
            "subject" => self.subject.as_deref(),
            "content_type" => Some(self.content_type.as_str()),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    /// Set a metadata key, routing typed keys to their fields
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "source_name" => self.source_name = Some(value),
            "page" => self.page = Some(value),
            "organization" => self.organization = Some(value),
            "subject" => self.subject = Some(value),
            "content_type" => self.content_type = ContentType::parse(&value),
            _ => {
                self.extra.insert(key, value);
            }
        }
    }

    /// Number of characters in the chunk text
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Tag distinguishing text, table and image-derived chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Table,
    Image,
}

impl ContentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Table => "table",
            Self::Image => "image",
        }
    }

    /// Lenient parse; anything unrecognised is plain text
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "table" => Self::Table,
            "image" => Self::Image,
            _ => Self::Text,
        }
    }
}

/// Character offsets of a window inside its source text (end exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

impl ChunkSpan {
    #[must_use]
    pub const fn len(self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// Two-tier chunking output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentChildChunks {
    pub parents: Vec<Chunk>,
    pub children: Vec<Chunk>,
}

/// A document split into chunks, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDocument {
    pub doc_id: String,

    /// Parent chunks; never embedded
    pub parents: Vec<Chunk>,

    /// Chunks that receive exactly one embedding each
    pub leaves: Vec<Chunk>,
}

impl ChunkedDocument {
    /// Chunks the caller must send to the embedding provider
    #[must_use]
    pub fn embeddable(&self) -> &[Chunk] {
        &self.leaves
    }

    #[must_use]
    pub fn is_hierarchical(&self) -> bool {
        !self.parents.is_empty()
    }

    #[must_use]
    pub fn total_chunks(&self) -> usize {
        self.parents.len() + self.leaves.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_prefers_typed_values() {
        let mut chunk = Chunk::new("d1_chunk_0", "d1", "body").source_name("act.pdf");
        chunk.extra.insert("doc_id".to_string(), "shadow".to_string());
        chunk.set_field("offence_number", "OFF-12");

        assert_eq!(chunk.field("doc_id"), Some("d1"));
        assert_eq!(chunk.field("source_name"), Some("act.pdf"));
        assert_eq!(chunk.field("offence_number"), Some("OFF-12"));
        assert_eq!(chunk.field("jurisdiction"), None);
        assert_eq!(chunk.field("content_type"), Some("text"));
    }

    #[test]
    fn set_field_routes_typed_keys() {
        let mut chunk = Chunk::new("c", "d", "t");
        chunk.set_field("page", "4");
        chunk.set_field("content_type", "Table");
        assert_eq!(chunk.page.as_deref(), Some("4"));
        assert_eq!(chunk.content_type, ContentType::Table);
        assert!(chunk.extra.is_empty());
    }

    #[test]
    fn char_len_counts_scalars() {
        let chunk = Chunk::new("c", "d", "héllo");
        assert_eq!(chunk.char_len(), 5);
    }
}
