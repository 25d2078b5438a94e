use crate::config::RerankBoosts;
use crate::filters::Filters;
use crate::types::SearchResult;
use retrieval_chunker::Chunk;

/// Total additive boost for one candidate
pub(crate) fn boost_for(
    chunk: &Chunk,
    content: &str,
    filters: &Filters,
    boosts: &RerankBoosts,
) -> f32 {
    let mut boost = 0.0;

    if requested_match(chunk, filters, "offence_number") {
        boost += boosts.offence_number;
    }
    if requested_match(chunk, filters, "jurisdiction") || requested_match(chunk, filters, "province")
    {
        boost += boosts.jurisdiction;
    }
    if content.chars().count() < boosts.concise_threshold_chars {
        boost += boosts.concise;
    }

    boost
}

fn requested_match(chunk: &Chunk, filters: &Filters, key: &str) -> bool {
    filters
        .value(key)
        .is_some_and(|wanted| chunk.field(key) == Some(wanted))
}

/// Apply capped boosts, stable-sort by boosted score, keep `k`
pub(crate) fn rerank(
    pool: Vec<SearchResult>,
    filters: &Filters,
    boosts: &RerankBoosts,
    k: usize,
) -> Vec<SearchResult> {
    let mut reranked: Vec<SearchResult> = pool
        .into_iter()
        .map(|mut result| {
            let boost = boost_for(&result.metadata, &result.content, filters, boosts);
            result.score = (result.similarity + boost).min(1.0);
            result
        })
        .collect();

    // `sort_by` is stable, so equal scores keep their original rank
    reranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    reranked.truncate(k);
    reranked
}
