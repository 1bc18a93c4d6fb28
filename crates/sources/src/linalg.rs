//! Small dense linear algebra kernels for the truncated SVD.
//!
//! The interaction matrix never gets densified: products with it walk the
//! stored entries only. Everything dense here is either tall-and-thin
//! (users × l, items × l) or tiny (l × l), with l = factors + oversamples.
//! The dense factorizations go through nalgebra.

use data_loader::InteractionMatrix;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2};
use rayon::prelude::*;

/// A · X for the sparse matrix A (users × items) and dense X (items × l)
pub(crate) fn sparse_dot(matrix: &InteractionMatrix, dense: &Array2<f64>) -> Array2<f64> {
    let (num_users, num_items) = matrix.shape();
    debug_assert_eq!(dense.nrows(), num_items);
    let width = dense.ncols();

    // each output row depends on one matrix row only, so rows are independent
    let rows: Vec<Array1<f64>> = (0..num_users)
        .into_par_iter()
        .map(|u| {
            let mut acc = Array1::<f64>::zeros(width);
            for (i, rating) in matrix.row(u).iter() {
                acc.scaled_add(rating, &dense.row(i));
            }
            acc
        })
        .collect();

    let mut out = Array2::<f64>::zeros((num_users, width));
    for (u, row) in rows.into_iter().enumerate() {
        out.row_mut(u).assign(&row);
    }
    out
}

/// Aᵀ · Y for the sparse matrix A (users × items) and dense Y (users × l)
pub(crate) fn sparse_t_dot(matrix: &InteractionMatrix, dense: &Array2<f64>) -> Array2<f64> {
    let (num_users, num_items) = matrix.shape();
    debug_assert_eq!(dense.nrows(), num_users);

    let mut out = Array2::<f64>::zeros((num_items, dense.ncols()));
    for u in 0..num_users {
        let source = dense.row(u);
        for (i, rating) in matrix.row(u).iter() {
            out.row_mut(i).scaled_add(rating, &source);
        }
    }
    out
}

/// Orthonormal basis of the column space, via Householder QR.
///
/// The result keeps the input shape (rows ≥ columns). Columns beyond the
/// numerical rank still come out orthonormal, they just span directions the
/// input does not use.
pub(crate) fn orthonormalize_columns(a: Array2<f64>) -> Array2<f64> {
    debug_assert!(a.nrows() >= a.ncols());
    from_dmatrix(&to_dmatrix(&a).qr().q())
}

/// Eigen-decomposition of a symmetric matrix.
///
/// Returns eigenvalues in descending order (ties keep nalgebra's order) and
/// the matching unit eigenvectors as columns.
pub(crate) fn symmetric_eigen(matrix: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = matrix.nrows();
    debug_assert_eq!(n, matrix.ncols());
    let eigen = SymmetricEigen::new(to_dmatrix(matrix));

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&x, &y| {
        crate::ranker::compare_desc(eigen.eigenvalues[x], eigen.eigenvalues[y])
    });

    let eigenvalues = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let eigenvectors =
        Array2::from_shape_fn((n, n), |(row, slot)| eigen.eigenvectors[(row, order[slot])]);
    (eigenvalues, eigenvectors)
}

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::RatingRecord;
    use ndarray::array;

    fn small_matrix() -> InteractionMatrix {
        // columns in first-seen order x, z, y:
        // [[1, 2, 0.5],
        //  [0, 0, 3  ]]
        InteractionMatrix::build(&[
            RatingRecord::new("a", "x", 1.0),
            RatingRecord::new("a", "z", 2.0),
            RatingRecord::new("b", "y", 3.0),
            RatingRecord::new("a", "y", 0.5),
        ])
        .unwrap()
    }

    #[test]
    fn test_sparse_products_match_dense() {
        let matrix = small_matrix();
        let dense_a = array![[1.0, 2.0, 0.5], [0.0, 0.0, 3.0]];
        let x = array![[1.0, -1.0], [2.0, 0.0], [0.5, 4.0]];
        assert_eq!(sparse_dot(&matrix, &x), dense_a.dot(&x));

        let y = array![[1.0, 2.0], [3.0, -1.0]];
        assert_eq!(sparse_t_dot(&matrix, &y), dense_a.t().dot(&y));
    }

    #[test]
    fn test_orthonormalize_columns() {
        let a = array![[1.0, 1.0], [0.0, 1.0], [1.0, 0.0], [2.0, 2.0]];
        let q = orthonormalize_columns(a.clone());
        assert_eq!(q.dim(), (4, 2));

        let gram = q.t().dot(&q);
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-12);
            }
        }
        // Q Qᵀ A = A: the basis spans the input columns
        let projected = q.dot(&q.t().dot(&a));
        for (p, x) in projected.iter().zip(a.iter()) {
            assert!((p - x).abs() < 1e-12);
        }
    }

    #[test]
    fn test_orthonormalize_rank_deficient_columns() {
        // third column is 2 × first
        let a = array![[1.0, 1.0, 2.0], [0.0, 1.0, 0.0], [1.0, 0.0, 2.0]];
        let q = orthonormalize_columns(a);
        let gram = q.t().dot(&q);
        for i in 0..3 {
            assert!((gram[[i, i]] - 1.0).abs() < 1e-12);
        }
        assert!(gram[[0, 2]].abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_eigen() {
        let m = array![[2.0, 1.0, 0.0], [1.0, 2.0, 0.0], [0.0, 0.0, 5.0]];
        let (values, vectors) = symmetric_eigen(&m);
        assert!((values[0] - 5.0).abs() < 1e-10);
        assert!((values[1] - 3.0).abs() < 1e-10);
        assert!((values[2] - 1.0).abs() < 1e-10);

        // M v = λ v for every pair
        for (j, &lambda) in values.iter().enumerate() {
            let v = vectors.column(j);
            let mv = m.dot(&v);
            for k in 0..3 {
                assert!((mv[k] - lambda * v[k]).abs() < 1e-10);
            }
        }
    }
}
