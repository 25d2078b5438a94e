use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::filters::Filters;
use crate::rerank::rerank;
use crate::types::{ContextBlock, SearchResult};
use retrieval_chunker::Chunk;
use retrieval_vector_store::{ParentStore, VectorStore};
use std::collections::HashMap;

/// Turns a query embedding into ranked, filtered results.
///
/// Holds configuration only; every call borrows the store it reads, so any
/// number of searches can share one read guard.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    config: SearchConfig,
}

impl Retriever {
    pub fn new(config: SearchConfig) -> Result<Self> {
        config.validate().map_err(SearchError::InvalidConfig)?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Top `k` live records that satisfy the hard filters, in similarity order.
    ///
    /// With hard filters present the index is over-fetched by
    /// `overfetch_factor`, capped at the store size. Soft filters are ignored
    /// here. Fewer than `k` results come back when too many candidates are
    /// deleted or filtered out.
    pub fn search(
        &self,
        store: &VectorStore,
        query: &[f32],
        k: usize,
        filters: &Filters,
    ) -> Result<Vec<SearchResult>> {
        let fetch = if filters.has_hard() {
            k.saturating_mul(self.config.overfetch_factor)
                .min(store.len())
        } else {
            k
        };

        let neighbors = store.search(query, fetch)?;
        let fetched = neighbors.len();

        let results: Vec<SearchResult> = neighbors
            .into_iter()
            .filter_map(|hit| {
                let chunk = store.live_record(hit.position)?.chunk.as_ref()?;
                filters.matches(chunk).then(|| SearchResult {
                    score: hit.score,
                    similarity: hit.score,
                    content: chunk.text.clone(),
                    chunk_id: chunk.id.clone(),
                    metadata: chunk.clone(),
                    position: hit.position,
                })
            })
            .take(k)
            .collect();

        log::debug!(
            "search k={k} fetched={fetched} returned={} filters={}",
            results.len(),
            filters.hard.len()
        );
        Ok(results)
    }

    /// Search a larger pool, apply metadata boosts, and re-rank.
    ///
    /// `pool_size` overrides the configured `rerank_pool_size`. Boosts read
    /// both hard and soft filter values; only hard ones exclude.
    pub fn search_with_reranking(
        &self,
        store: &VectorStore,
        query: &[f32],
        k: usize,
        filters: &Filters,
        pool_size: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let pool_size = pool_size.unwrap_or(self.config.rerank_pool_size);
        let pool = self.search(store, query, pool_size, &filters.hard_only())?;
        let pooled = pool.len();
        let reranked = rerank(pool, filters, &self.config.boosts, k);

        log::debug!(
            "rerank pool={pooled} returned={} soft_filters={}",
            reranked.len(),
            filters.soft.len()
        );
        Ok(reranked)
    }

    /// Parent chunk enclosing `result`, if it has one and the parent is stored
    pub fn expand_parent_context<'a>(
        &self,
        parents: &'a ParentStore,
        result: &SearchResult,
    ) -> Option<&'a Chunk> {
        let parent_id = result.metadata.parent_id.as_deref()?;
        let parent = parents.get(parent_id);
        if parent.is_none() {
            log::warn!(
                "Parent {parent_id} of chunk {} not found; using the chunk alone",
                result.chunk_id
            );
        }
        parent
    }

    /// Context blocks for generation: each parent at most once, in first-hit order.
    ///
    /// Results with no resolvable parent contribute their own text.
    pub fn assemble_context(
        &self,
        parents: &ParentStore,
        results: &[SearchResult],
    ) -> Vec<ContextBlock> {
        let mut blocks: Vec<ContextBlock> = Vec::new();
        let mut by_parent: HashMap<&str, usize> = HashMap::new();

        for result in results {
            match self.expand_parent_context(parents, result) {
                Some(parent) => {
                    if let Some(&slot) = by_parent.get(parent.id.as_str()) {
                        blocks[slot].chunk_ids.push(result.chunk_id.clone());
                        continue;
                    }
                    by_parent.insert(parent.id.as_str(), blocks.len());
                    blocks.push(ContextBlock {
                        id: parent.id.clone(),
                        text: parent.text.clone(),
                        expanded: true,
                        chunk_ids: vec![result.chunk_id.clone()],
                    });
                }
                None => blocks.push(ContextBlock {
                    id: result.chunk_id.clone(),
                    text: result.content.clone(),
                    expanded: false,
                    chunk_ids: vec![result.chunk_id.clone()],
                }),
            }
        }

        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use retrieval_vector_store::IndexBackend;

    fn store() -> VectorStore {
        let mut store = VectorStore::new(3, IndexBackend::Flat).unwrap();
        store
            .add(
                vec![
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![0.9, 0.1, 0.0],
                    vec![0.8, 0.2, 0.0],
                ],
                vec![
                    Chunk::new("a0", "A", "alpha zero")
                        .with_meta("jurisdiction", "ON")
                        .parent_id("A_parent_0"),
                    Chunk::new("b0", "B", "beta zero").with_meta("jurisdiction", "BC"),
                    Chunk::new("a1", "A", "alpha one")
                        .with_meta("jurisdiction", "ON")
                        .parent_id("A_parent_0"),
                    Chunk::new("c0", "C", "x".repeat(1200))
                        .with_meta("offence_number", "42")
                        .with_meta("jurisdiction", "BC"),
                ],
            )
            .unwrap();
        store
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk_id.as_str()).collect()
    }

    #[test]
    fn plain_search_preserves_index_order() {
        let retriever = Retriever::default();
        let results = retriever
            .search(&store(), &[1.0, 0.0, 0.0], 3, &Filters::new())
            .unwrap();
        assert_eq!(ids(&results), vec!["a0", "a1", "c0"]);
        assert_eq!(results[0].content, "alpha zero");
        assert_eq!(results[0].metadata.doc_id, "A");
        assert_eq!(results[1].position, 2);
    }

    #[test]
    fn hard_filters_exclude_mismatches() {
        let retriever = Retriever::default();
        let filters = Filters::new().hard("jurisdiction", "BC");
        let results = retriever
            .search(&store(), &[1.0, 0.0, 0.0], 2, &filters)
            .unwrap();
        assert_eq!(ids(&results), vec!["c0", "b0"]);
        assert!(results
            .iter()
            .all(|r| r.metadata.field("jurisdiction") == Some("BC")));
    }

    #[test]
    fn deleted_records_are_never_returned() {
        let mut store = store();
        store.soft_delete_by_chunk_id("a0");
        let retriever = Retriever::default();

        let results = retriever
            .search(&store, &[1.0, 0.0, 0.0], 4, &Filters::new())
            .unwrap();
        assert_eq!(ids(&results), vec!["a1", "c0", "b0"]);

        let filtered = retriever
            .search(&store, &[1.0, 0.0, 0.0], 4, &Filters::new().hard("doc_id", "A"))
            .unwrap();
        assert_eq!(ids(&filtered), vec!["a1"]);
    }

    #[test]
    fn empty_store_yields_nothing() {
        let store = VectorStore::new(3, IndexBackend::Matrix).unwrap();
        let retriever = Retriever::default();
        assert!(retriever
            .search(&store, &[1.0, 0.0, 0.0], 5, &Filters::new().hard("k", "v"))
            .unwrap()
            .is_empty());
        assert!(retriever
            .search_with_reranking(&store, &[1.0, 0.0, 0.0], 5, &Filters::new(), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn wrong_query_dimension_is_an_error() {
        let retriever = Retriever::default();
        assert!(matches!(
            retriever.search(&store(), &[1.0, 0.0], 1, &Filters::new()),
            Err(SearchError::VectorStoreError(_))
        ));
    }

    #[test]
    fn reranking_applies_soft_offence_boost() {
        let mut config = SearchConfig::default();
        config.boosts.concise = 0.0;
        let retriever = Retriever::new(config).unwrap();
        let filters = Filters::new().soft("offence_number", "42");
        let results = retriever
            .search_with_reranking(&store(), &[1.0, 0.0, 0.0], 2, &filters, None)
            .unwrap();

        // c0: 0.970 + 0.20, capped to 1.0, overtakes a1 (0.994)
        assert_eq!(ids(&results), vec!["a0", "c0"]);
        assert!((results[1].score - 1.0).abs() < 1e-6);
        assert!((results[1].similarity - 0.970).abs() < 1e-3);
    }

    #[test]
    fn reranking_respects_hard_filters() {
        let retriever = Retriever::default();
        let filters = Filters::new()
            .hard("jurisdiction", "ON")
            .soft("offence_number", "42");
        let results = retriever
            .search_with_reranking(&store(), &[1.0, 0.0, 0.0], 5, &filters, Some(10))
            .unwrap();
        assert_eq!(ids(&results), vec!["a0", "a1"]);
    }

    #[test]
    fn parent_expansion_and_context_assembly() {
        let retriever = Retriever::default();
        let mut parents = ParentStore::new();
        parents.insert(Chunk::new("A_parent_0", "A", "alpha zero alpha one"));

        let results = retriever
            .search(&store(), &[1.0, 0.0, 0.0], 4, &Filters::new())
            .unwrap();
        assert_eq!(
            retriever
                .expand_parent_context(&parents, &results[0])
                .map(|p| p.id.as_str()),
            Some("A_parent_0")
        );
        assert!(retriever.expand_parent_context(&parents, &results[2]).is_none());

        let blocks = retriever.assemble_context(&parents, &results);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].id, "A_parent_0");
        assert!(blocks[0].expanded);
        assert_eq!(blocks[0].chunk_ids, vec!["a0", "a1"]);
        assert_eq!(blocks[1].id, "c0");
        assert!(!blocks[1].expanded);
        assert_eq!(blocks[2].text, "beta zero");
    }

    #[test]
    fn missing_parent_falls_back_to_chunk_text() {
        let retriever = Retriever::default();
        let results = retriever
            .search(&store(), &[1.0, 0.0, 0.0], 1, &Filters::new())
            .unwrap();
        let blocks = retriever.assemble_context(&ParentStore::new(), &results);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "alpha zero");
        assert!(!blocks[0].expanded);
    }

    #[test]
    fn zero_overfetch_is_rejected() {
        let config = SearchConfig {
            overfetch_factor: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(
            Retriever::new(config),
            Err(SearchError::InvalidConfig(_))
        ));
    }
}
