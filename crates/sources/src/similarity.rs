//! Cosine similarity for sparse rating rows and dense profile vectors.
//!
//! cos(a, b) = (a . b) / (||a|| x ||b||), in [-1, 1]. A zero-magnitude
//! vector has no direction; its similarity to anything is 0.0.

use data_loader::SparseRow;

/// Cosine similarity of two sparse rows over the full item dimensionality
pub fn sparse_cosine(a: &SparseRow<'_>, b: &SparseRow<'_>) -> f64 {
    cosine_with_norms(a.dot(b), a.norm(), b.norm())
}

/// Cosine from a precomputed dot product and norms
pub fn cosine_with_norms(dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    // floating point can overshoot the bound by an ulp
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Cosine similarity of two dense vectors of equal length
pub fn dense_cosine(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_identical_and_orthogonal() {
        assert!((dense_cosine(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-6);
        assert_eq!(dense_cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((dense_cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_similarity_is_zero() {
        assert_eq!(dense_cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_with_norms(0.0, 0.0, 3.0), 0.0);
    }

    #[test]
    fn test_sparse_rows_include_non_overlapping_items() {
        // [5, 3, 0] vs [4, 0, 5]
        let a = SparseRow::new(&[0, 1], &[5.0, 3.0]);
        let b = SparseRow::new(&[0, 2], &[4.0, 5.0]);
        let expected = 20.0 / (34f64.sqrt() * 41f64.sqrt());
        assert_eq!(sparse_cosine(&a, &b), expected);
    }
}
