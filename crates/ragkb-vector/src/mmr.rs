//! Maximal Marginal Relevance selection.
//!
//! Greedily picks `k` candidates from the head of a ranking, each time taking
//! the one maximizing `lambda * relevance - (1 - lambda) * redundancy`, where
//! relevance is cosine similarity to the primary query vector and redundancy
//! the highest cosine similarity to anything already picked.

use ragkb_core::types::ScoredCandidate;

use crate::similarity::cosine;

pub const DEFAULT_LAMBDA: f32 = 0.7;

/// Number of ranked entries considered for a selection of size `k`.
pub fn candidate_pool_size(k: usize) -> usize {
    k.saturating_mul(3).max(20)
}

/// Select up to `k` diverse candidates from `ranked`.
///
/// The pool is the first `max(3k, 20)` ranked entries and the output has
/// `min(k, pool)` items. The first pick is always the candidate most relevant
/// to `query`, whatever `lambda` is. Returned items keep their merged score.
pub fn select(
    query: &[f32],
    ranked: &[ScoredCandidate],
    vectors: &[Vec<f32>],
    k: usize,
    lambda: f32,
) -> Vec<ScoredCandidate> {
    let pool = &ranked[..ranked.len().min(candidate_pool_size(k))];
    let relevance: Vec<f32> = pool.iter().map(|c| cosine(query, &vectors[c.doc_index])).collect();
    let target = k.min(pool.len());

    let mut taken = vec![false; pool.len()];
    // highest similarity of each candidate to the current selection, 0 while empty
    let mut redundancy = vec![0f32; pool.len()];
    let mut selected = Vec::with_capacity(target);

    while selected.len() < target {
        let mut best: Option<(usize, f32)> = None;
        for (i, rel) in relevance.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let mmr = if selected.is_empty() { *rel } else { lambda * rel - (1.0 - lambda) * redundancy[i] };
            if best.map_or(true, |(_, top)| mmr > top) {
                best = Some((i, mmr));
            }
        }
        let Some((pick, _)) = best else { break };
        taken[pick] = true;
        let picked = pool[pick];
        selected.push(picked);

        let picked_vec = &vectors[picked.doc_index];
        for (i, cand) in pool.iter().enumerate() {
            if !taken[i] {
                redundancy[i] = redundancy[i].max(cosine(&vectors[cand.doc_index], picked_vec));
            }
        }
    }
    selected
}
