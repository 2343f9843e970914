//! Minimum-norm least squares.
//!
//! Every regression step in this crate reduces to:
//!
//! ```text
//! minimize ‖Θ Ξ - Y‖²
//! ```
//!
//! for a design matrix `Θ` (samples × basis functions) and one or more target
//! columns `Y`.
//!
//! Implementation choices:
//! - We solve via SVD so tall, square and wide systems are all handled.
//! - Singular values at or below `eps · max(n, m) · σ_max` are dropped (the same
//!   cutoff numpy's `lstsq(rcond=None)` uses). On rank-deficient designs this gives
//!   the minimum-norm solution, which the sparsifiers rely on: collinear basis
//!   columns share the weight instead of the solve failing.
//! - All target columns are solved against one decomposition.

use nalgebra::{DMatrix, DVector};

use crate::error::{IdentError, Result};

/// Solve `theta · xi ≈ y` for every column of `y` at once.
pub fn solve_least_squares_multi(theta: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (n, m) = theta.shape();
    if n == 0 || m == 0 {
        return Err(IdentError::invalid(format!(
            "least-squares design matrix is empty ({n}x{m})"
        )));
    }
    if y.nrows() != n {
        return Err(IdentError::invalid(format!(
            "design matrix has {n} rows but target has {}",
            y.nrows()
        )));
    }

    let svd = theta.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    let cutoff = f64::EPSILON * n.max(m) as f64 * sigma_max;

    let xi = svd
        .solve(y, cutoff)
        .map_err(|e| IdentError::LeastSquares(e.to_string()))?;

    if xi.iter().all(|v| v.is_finite()) {
        Ok(xi)
    } else {
        Err(IdentError::LeastSquares(
            "solution contains non-finite values".to_string(),
        ))
    }
}

/// Solve `theta · xi ≈ y` for a single target.
pub fn solve_least_squares(theta: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>> {
    let y = DMatrix::from_column_slice(y.len(), 1, y.as_slice());
    let xi = solve_least_squares_multi(theta, &y)?;
    Ok(xi.column(0).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn duplicated_columns_share_weight() {
        // Two identical columns: the minimum-norm solution splits the coefficient.
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        let y = DVector::from_row_slice(&[2.0, 4.0, 6.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-10);
        assert!((beta[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn multi_target_matches_column_by_column() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, -1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DMatrix::from_row_slice(4, 2, &[0.0, 3.0, 1.0, 3.0, 2.1, 2.9, 2.9, 3.0]);

        let all = solve_least_squares_multi(&x, &y).unwrap();
        for k in 0..2 {
            let single = solve_least_squares(&x, &y.column(k).into_owned()).unwrap();
            for i in 0..2 {
                assert!((all[(i, k)] - single[i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn empty_design_is_rejected() {
        let x = DMatrix::<f64>::zeros(3, 0);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            solve_least_squares(&x, &y),
            Err(IdentError::InvalidInput(_))
        ));
    }
}
