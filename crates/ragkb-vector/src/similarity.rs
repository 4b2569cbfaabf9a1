use rayon::prelude::*;

/// Cosine similarity over the common prefix of `a` and `b`.
///
/// Accumulates in f64. A zero norm on either side gives a denominator of 1,
/// so a zero vector scores 0 against everything.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (&x, &y) in a[..n].iter().zip(&b[..n]) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    let denom = if denom == 0.0 { 1.0 } else { denom };
    (dot / denom) as f32
}

/// Score every indexed vector against one query, in index order.
pub fn score_all(query: &[f32], vectors: &[Vec<f32>]) -> Vec<f32> {
    vectors.par_iter().map(|v| cosine(query, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[], &[]), 0.0);
    }

    #[test]
    fn uses_shorter_length() {
        // trailing component of the longer vector is ignored
        let s = cosine(&[1.0, 0.0, 5.0], &[1.0, 0.0]);
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_and_opposite() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn score_all_keeps_order() {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.9, 0.1]];
        let scores = score_all(&[1.0, 0.0], &vectors);
        assert_eq!(scores.len(), 3);
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert!(scores[1].abs() < 1e-6);
        assert!((scores[2] - 0.9939).abs() < 1e-3);
    }
}
