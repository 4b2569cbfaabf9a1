use proptest::prelude::*;

use ragkb_vector::merge::merge_variants;
use ragkb_vector::mmr;
use ragkb_vector::similarity::cosine;

fn vector(len: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-10.0f32..10.0, len)
}

proptest! {
    #[test]
    fn cosine_is_symmetric(a in vector(8), b in vector(8)) {
        prop_assert_eq!(cosine(&a, &b), cosine(&b, &a));
    }

    #[test]
    fn cosine_is_bounded(a in vector(8), b in vector(8)) {
        let s = cosine(&a, &b);
        prop_assert!((-1.0001..=1.0001).contains(&s));
    }

    #[test]
    fn self_similarity_is_one(a in vector(16)) {
        prop_assume!(a.iter().any(|x| x.abs() > 1e-3));
        prop_assert!((cosine(&a, &a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn merged_ranking_is_descending(
        queries in prop::collection::vec(vector(4), 1..4),
        docs in prop::collection::vec(vector(4), 0..30),
    ) {
        let ranked = merge_variants(&queries, &docs);
        prop_assert_eq!(ranked.len(), docs.len());
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn mmr_size_and_uniqueness(
        docs in prop::collection::vec(vector(4), 1..40),
        k in 1usize..12,
        lambda in 0.0f32..=1.0,
    ) {
        let query = vec![1.0, 0.5, -0.25, 0.0];
        let ranked = merge_variants(&[query.clone()], &docs);
        let picked = mmr::select(&query, &ranked, &docs, k, lambda);
        prop_assert_eq!(picked.len(), k.min(docs.len()));
        let mut ids: Vec<usize> = picked.iter().map(|c| c.doc_index).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), picked.len());
        // first pick is the most relevant candidate
        let best = ranked.iter().map(|c| cosine(&query, &docs[c.doc_index])).fold(f32::NEG_INFINITY, f32::max);
        prop_assert_eq!(cosine(&query, &docs[picked[0].doc_index]), best);
    }
}
