use proptest::prelude::*;
use retrieval_chunker::{chunk, chunk_parent_child, chunk_spans};

/// Rebuild the source by dropping the overlapping prefix of every window but the first.
fn stitch(chunks: &[String], overlap: usize) -> String {
    let mut out = String::new();
    for (i, window) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(window);
        } else {
            out.extend(window.chars().skip(overlap));
        }
    }
    out
}

proptest! {
    #[test]
    fn stitched_chunks_reconstruct_text(
        text in "\\PC{0,400}",
        size in 1usize..64,
        overlap_seed in 0usize..64,
    ) {
        let overlap = overlap_seed % size;
        let chunks = chunk(&text, size, overlap).unwrap();
        prop_assert_eq!(stitch(&chunks, overlap), text);
    }

    #[test]
    fn windows_never_exceed_size(
        text in "[a-z ]{0,300}",
        size in 1usize..50,
        overlap_seed in 0usize..50,
    ) {
        let overlap = overlap_seed % size;
        for window in chunk(&text, size, overlap).unwrap() {
            prop_assert!(window.chars().count() <= size);
            prop_assert!(!window.is_empty());
        }
    }

    #[test]
    fn degenerate_overlap_yields_one_chunk(
        size in 1usize..40,
        extra in 1usize..200,
        overlap_extra in 0usize..40,
    ) {
        let text = "q".repeat(size + extra);
        let chunks = chunk(&text, size, size + overlap_extra).unwrap();
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(chunks[0].chars().count(), size);
    }

    #[test]
    fn spans_advance_by_step(
        len in 0usize..500,
        size in 1usize..60,
        overlap_seed in 0usize..60,
    ) {
        let overlap = overlap_seed % size;
        let text = "z".repeat(len);
        let spans = chunk_spans(&text, size, overlap).unwrap();
        for pair in spans.windows(2) {
            prop_assert_eq!(pair[1].start - pair[0].start, size - overlap);
        }
        if let Some(last) = spans.last() {
            prop_assert_eq!(last.end, len);
        }
    }

    #[test]
    fn children_cover_their_parent(
        text in "[a-z]{1,300}",
        child_size in 1usize..30,
    ) {
        let tiers = chunk_parent_child("doc", &text, 60, 10, child_size, 0).unwrap();
        for parent in &tiers.parents {
            let joined: String = tiers
                .children
                .iter()
                .filter(|c| c.parent_id.as_deref() == Some(parent.id.as_str()))
                .map(|c| c.text.as_str())
                .collect();
            prop_assert_eq!(&joined, &parent.text);
        }
    }
}
