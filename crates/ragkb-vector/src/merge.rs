use rayon::prelude::*;
use std::cmp::Ordering;

use ragkb_core::types::ScoredCandidate;

use crate::similarity::cosine;

/// Rank every indexed vector by its best cosine score across the query variants.
///
/// Taking the max lets a document that matches any phrasing strongly keep its
/// score instead of being diluted by the weaker ones. The result is sorted by
/// descending score; the sort is stable, so ties stay in index order. No
/// variants means no ranking.
pub fn merge_variants(query_vectors: &[Vec<f32>], vectors: &[Vec<f32>]) -> Vec<ScoredCandidate> {
    if query_vectors.is_empty() {
        return Vec::new();
    }
    let best: Vec<f32> = vectors
        .par_iter()
        .map(|v| query_vectors.iter().map(|q| cosine(q, v)).fold(f32::NEG_INFINITY, f32::max))
        .collect();
    let mut ranked: Vec<ScoredCandidate> =
        best.into_iter().enumerate().map(|(doc_index, score)| ScoredCandidate { doc_index, score }).collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}
