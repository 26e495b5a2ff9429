//! Linear algebra on `ndarray` matrices.
use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

/// Singular values at or below this fraction of the largest singular value are treated as zero
/// when computing a pseudo-inverse.
pub const PINV_RELATIVE_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinalgError {
    #[error("singular value decomposition failed: {0}")]
    Svd(&'static str),
}

/// Moore-Penrose pseudo-inverse.
///
/// Computed from the singular value decomposition. Singular values no larger than
/// `relative_tolerance` times the largest singular value are dropped, so rank-deficient and
/// ill-conditioned matrices are handled without failing.
///
/// # Errors
/// If `relative_tolerance` is negative.
pub fn pseudo_inverse(
    matrix: ArrayView2<f64>,
    relative_tolerance: f64,
) -> Result<Array2<f64>, LinalgError> {
    let (rows, cols) = matrix.dim();
    let m = DMatrix::from_fn(rows, cols, |i, j| matrix[(i, j)]);
    let svd = m.svd(true, true);
    let max_singular_value = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let pinv = svd
        .pseudo_inverse(relative_tolerance * max_singular_value)
        .map_err(LinalgError::Svd)?;
    Ok(Array2::from_shape_fn((cols, rows), |(i, j)| pinv[(i, j)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>, tol: f64) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{} != {}\n{}\n{}", x, y, a, b);
        }
    }

    #[test]
    fn invertible_matches_inverse() {
        let m = arr2(&[[4.0, 1.0], [1.0, 3.0]]);
        let m_inv = pseudo_inverse(m.view(), PINV_RELATIVE_TOLERANCE).unwrap();
        assert_close(&m_inv.dot(&m), &Array2::eye(2), 1e-10);
        assert_close(&m.dot(&m_inv), &Array2::eye(2), 1e-10);
    }

    #[test]
    fn rank_deficient_moore_penrose_conditions() {
        // Gram matrix of features with duplicate columns
        let m = arr2(&[[1.0, 1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 2.0]]);
        let m_inv = pseudo_inverse(m.view(), PINV_RELATIVE_TOLERANCE).unwrap();
        assert_close(&m.dot(&m_inv).dot(&m), &m, 1e-10);
        assert_close(&m_inv.dot(&m).dot(&m_inv), &m_inv, 1e-10);
        // Symmetric projections
        let mm_inv = m.dot(&m_inv);
        assert_close(&mm_inv.t().to_owned(), &mm_inv, 1e-10);
        let expected = arr2(&[[0.25, 0.25, 0.0], [0.25, 0.25, 0.0], [0.0, 0.0, 0.5]]);
        assert_close(&m_inv, &expected, 1e-10);
    }

    #[test]
    fn zero_matrix_has_zero_pseudo_inverse() {
        let m = Array2::<f64>::zeros((3, 3));
        let m_inv = pseudo_inverse(m.view(), PINV_RELATIVE_TOLERANCE).unwrap();
        assert_close(&m_inv, &m, f64::EPSILON);
    }

    #[test]
    fn rectangular_shape_is_transposed() {
        let m = arr2(&[[1.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
        let m_inv = pseudo_inverse(m.view(), PINV_RELATIVE_TOLERANCE).unwrap();
        assert_eq!(m_inv.dim(), (3, 2));
        assert_close(&m_inv, &arr2(&[[1.0, 0.0], [0.0, 0.5], [0.0, 0.0]]), 1e-12);
    }

    #[test]
    fn negative_tolerance_is_an_error() {
        let m = Array2::<f64>::eye(2);
        assert!(pseudo_inverse(m.view(), -1.0).is_err());
    }
}
