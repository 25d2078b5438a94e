use crate::config::{ChunkerConfig, ChunkingStrategy};
use crate::error::{ChunkerError, Result};
use crate::types::{Chunk, ChunkSpan, ChunkedDocument, ParentChildChunks};

/// Split `text` into overlapping character windows.
///
/// Offsets are Unicode scalar values, so a window never splits a code point.
/// When `overlap >= size` the window cannot advance and only the first window
/// is produced.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    let offsets = char_offsets(text);
    let spans = window_spans(offsets.len() - 1, size, overlap)?;
    Ok(spans
        .into_iter()
        .map(|span| text[offsets[span.start]..offsets[span.end]].to_string())
        .collect())
}

/// Window boundaries, in characters, that [`chunk`] would cut `text` at
pub fn chunk_spans(text: &str, size: usize, overlap: usize) -> Result<Vec<ChunkSpan>> {
    window_spans(text.chars().count(), size, overlap)
}

/// Two-tier segmentation: parents from the parent window, children cut from
/// each parent's text with the child window.
///
/// Ids are `{doc_id}_parent_{i}` and `{parent_id}_child_{j}`, so the same
/// document id and text always reproduce the same ids.
pub fn chunk_parent_child(
    doc_id: &str,
    text: &str,
    parent_size: usize,
    parent_overlap: usize,
    child_size: usize,
    child_overlap: usize,
) -> Result<ParentChildChunks> {
    if doc_id.is_empty() {
        return Err(ChunkerError::EmptyDocId);
    }
    // Reject a bad child window up front, even if no parent would exercise it.
    check_size(child_size)?;

    let mut out = ParentChildChunks::default();
    for (i, parent_text) in chunk(text, parent_size, parent_overlap)?
        .into_iter()
        .enumerate()
    {
        let parent_id = format!("{doc_id}_parent_{i}");
        for (j, child_text) in chunk(&parent_text, child_size, child_overlap)?
            .into_iter()
            .enumerate()
        {
            out.children.push(
                Chunk::new(format!("{parent_id}_child_{j}"), doc_id, child_text)
                    .parent_id(parent_id.clone()),
            );
        }
        out.parents.push(Chunk::new(parent_id, doc_id, parent_text));
    }
    Ok(out)
}

/// Configured chunker producing fully populated [`Chunk`]s
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        if config.chunk_overlap >= config.chunk_size {
            log::warn!(
                "chunk_overlap ({}) >= chunk_size ({}); every text yields a single chunk",
                config.chunk_overlap,
                config.chunk_size
            );
        }
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk one document.
    ///
    /// Provenance metadata (source name, page, organization, extra keys, ...)
    /// is copied from `template`; id, text, parent and doc id are assigned here.
    pub fn chunk_document(
        &self,
        doc_id: &str,
        text: &str,
        template: &Chunk,
    ) -> Result<ChunkedDocument> {
        if doc_id.is_empty() {
            return Err(ChunkerError::EmptyDocId);
        }

        let stamp = |raw: Chunk| Chunk {
            id: raw.id,
            text: raw.text,
            parent_id: raw.parent_id,
            doc_id: raw.doc_id,
            ..template.clone()
        };

        let document = match self.config.strategy {
            ChunkingStrategy::Flat => {
                let leaves = chunk(text, self.config.chunk_size, self.config.chunk_overlap)?
                    .into_iter()
                    .enumerate()
                    .map(|(i, window)| {
                        stamp(Chunk::new(format!("{doc_id}_chunk_{i}"), doc_id, window))
                    })
                    .collect();
                ChunkedDocument {
                    doc_id: doc_id.to_string(),
                    parents: Vec::new(),
                    leaves,
                }
            }
            ChunkingStrategy::ParentChild => {
                let tiers = chunk_parent_child(
                    doc_id,
                    text,
                    self.config.parent_size,
                    self.config.parent_overlap,
                    self.config.chunk_size,
                    self.config.chunk_overlap,
                )?;
                ChunkedDocument {
                    doc_id: doc_id.to_string(),
                    parents: tiers.parents.into_iter().map(stamp).collect(),
                    leaves: tiers.children.into_iter().map(stamp).collect(),
                }
            }
        };

        log::debug!(
            "Chunked document {doc_id}: {} parents, {} embeddable chunks",
            document.parents.len(),
            document.leaves.len()
        );
        Ok(document)
    }
}

fn check_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(ChunkerError::invalid_parameters("size must be > 0"));
    }
    Ok(())
}

/// Byte offset of every char start, plus the end of the text
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(idx, _)| idx)
        .chain(std::iter::once(text.len()))
        .collect()
}

fn window_spans(len: usize, size: usize, overlap: usize) -> Result<Vec<ChunkSpan>> {
    check_size(size)?;

    if len == 0 {
        return Ok(Vec::new());
    }
    if len <= size {
        return Ok(vec![ChunkSpan { start: 0, end: len }]);
    }
    if overlap >= size {
        return Ok(vec![ChunkSpan {
            start: 0,
            end: size,
        }]);
    }

    let step = size - overlap;
    let mut spans = Vec::with_capacity(len / step + 1);
    let mut start = 0;
    loop {
        let end = (start + size).min(len);
        spans.push(ChunkSpan { start, end });
        if end >= len {
            break;
        }
        start += step;
    }
    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(chunk("hello", 10, 2).unwrap(), vec!["hello".to_string()]);
        assert_eq!(chunk("hello", 5, 2).unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunk("", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            chunk("abc", 0, 0),
            Err(ChunkerError::InvalidParameters(_))
        ));
        assert!(matches!(
            chunk("", 0, 0),
            Err(ChunkerError::InvalidParameters(_))
        ));
    }

    #[test]
    fn overlapping_windows_match_expected_offsets() {
        let text: String = (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let spans = chunk_spans(&text, 1000, 200).unwrap();
        assert_eq!(
            spans,
            vec![
                ChunkSpan { start: 0, end: 1000 },
                ChunkSpan { start: 800, end: 1800 },
                ChunkSpan { start: 1600, end: 2500 },
            ]
        );

        let chunks = chunk(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].as_str(), &text[0..1000]);
        assert_eq!(chunks[1].as_str(), &text[800..1800]);
        assert_eq!(chunks[2].as_str(), &text[1600..2500]);
        assert_eq!(chunks[2].len(), 900);
    }

    #[test]
    fn degenerate_overlap_emits_first_window_only() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        assert_eq!(chunk(text, 5, 5).unwrap(), vec!["abcde".to_string()]);
        assert_eq!(chunk(text, 5, 9).unwrap(), vec!["abcde".to_string()]);
    }

    #[test]
    fn windows_respect_multibyte_chars() {
        let text = "ééééé";
        assert_eq!(
            chunk(text, 2, 1).unwrap(),
            vec!["éé".to_string(), "éé".to_string(), "éé".to_string(), "éé".to_string()]
        );
    }

    #[test]
    fn parent_child_ids_are_derived_from_doc_id() {
        let text = "0123456789".repeat(3);
        let tiers = chunk_parent_child("doc", &text, 20, 0, 10, 0).unwrap();

        let parent_ids: Vec<&str> = tiers.parents.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(parent_ids, vec!["doc_parent_0", "doc_parent_1"]);
        assert!(tiers.parents.iter().all(Chunk::is_top_level));

        let child_ids: Vec<&str> = tiers.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            child_ids,
            vec![
                "doc_parent_0_child_0",
                "doc_parent_0_child_1",
                "doc_parent_1_child_0"
            ]
        );
        assert_eq!(
            tiers.children[2].parent_id.as_deref(),
            Some("doc_parent_1")
        );

        let again = chunk_parent_child("doc", &text, 20, 0, 10, 0).unwrap();
        assert_eq!(tiers, again);
    }

    #[test]
    fn parent_child_rejects_zero_child_size() {
        assert!(chunk_parent_child("doc", "text", 10, 0, 0, 0).is_err());
        assert!(matches!(
            chunk_parent_child("", "text", 10, 0, 5, 0),
            Err(ChunkerError::EmptyDocId)
        ));
    }

    #[test]
    fn chunk_document_copies_template_metadata() {
        let chunker = Chunker::new(ChunkerConfig {
            chunk_size: 4,
            chunk_overlap: 0,
            ..ChunkerConfig::default()
        })
        .unwrap();
        let template = Chunk::default()
            .source_name("statute.pdf")
            .with_meta("jurisdiction", "ON");

        let doc = chunker.chunk_document("d1", "abcdefgh", &template).unwrap();
        assert!(!doc.is_hierarchical());
        assert_eq!(doc.embeddable().len(), 2);
        assert_eq!(doc.leaves[1].id, "d1_chunk_1");
        assert_eq!(doc.leaves[1].text, "efgh");
        assert_eq!(doc.leaves[1].doc_id, "d1");
        assert_eq!(doc.leaves[1].source_name.as_deref(), Some("statute.pdf"));
        assert_eq!(doc.leaves[1].field("jurisdiction"), Some("ON"));
    }

    #[test]
    fn chunk_document_hierarchical_embeds_children_only() {
        let chunker = Chunker::new(ChunkerConfig {
            strategy: ChunkingStrategy::ParentChild,
            chunk_size: 5,
            chunk_overlap: 0,
            parent_size: 10,
            parent_overlap: 0,
        })
        .unwrap();

        let doc = chunker
            .chunk_document("d2", &"x".repeat(20), &Chunk::default())
            .unwrap();
        assert!(doc.is_hierarchical());
        assert_eq!(doc.parents.len(), 2);
        assert_eq!(doc.embeddable().len(), 4);
        assert!(doc.embeddable().iter().all(|c| c.parent_id.is_some()));
        assert_eq!(doc.total_chunks(), 6);
    }

    #[test]
    fn chunker_rejects_invalid_config() {
        let config = ChunkerConfig {
            chunk_size: 0,
            ..ChunkerConfig::default()
        };
        assert!(matches!(
            Chunker::new(config),
            Err(ChunkerError::InvalidConfig(_))
        ));
    }
}
