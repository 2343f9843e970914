//! Sequentially thresholded least squares (STLSQ).
//!
//! Given a design matrix `Θ` (samples × basis functions) and targets `dX/dt`
//! (samples × states), find a sparse `Ξ` with `Θ Ξ ≈ dX/dt`:
//!
//! - initial fit: one least-squares solve covering every state column
//! - then exactly `n_iter` threshold-and-refit rounds (see `fit::sparsify`)
//!
//! The loop never exits early. Once the support stops changing, further rounds
//! reproduce the same coefficients, so running the full count only costs time.
//!
//! The threshold applies to raw coefficients. Basis columns of very different
//! scale therefore compete unevenly; callers wanting a degree-comparable threshold
//! over a polynomial basis should use `fit::stlsq_odr`, which normalizes first.

use log::debug;
use nalgebra::DMatrix;

use crate::domain::{support_sizes, SparseFit, SparsifyRound, StlsqOptions};
use crate::error::{IdentError, Result};
use crate::fit::sparsify::threshold_and_refit;
use crate::math::{solve_least_squares, solve_least_squares_multi};

/// Sparse coefficients `Ξ` (n_basis × n_states).
pub fn stlsq(theta: &DMatrix<f64>, dxdt: &DMatrix<f64>, opts: &StlsqOptions) -> Result<DMatrix<f64>> {
    Ok(stlsq_with_trace(theta, dxdt, opts)?.coefficients)
}

/// STLSQ keeping a coefficient snapshot after the initial fit and after each round.
pub fn stlsq_with_trace(theta: &DMatrix<f64>, dxdt: &DMatrix<f64>, opts: &StlsqOptions) -> Result<SparseFit> {
    opts.validate()?;
    if theta.nrows() != dxdt.nrows() {
        return Err(IdentError::invalid(format!(
            "Theta has {} rows but dXdt has {}",
            theta.nrows(),
            dxdt.nrows()
        )));
    }
    if dxdt.ncols() == 0 {
        return Err(IdentError::invalid("dXdt has no state columns"));
    }

    let mut xi = solve_least_squares_multi(theta, dxdt)?;
    let mut rounds = Vec::with_capacity(opts.n_iter + 1);
    rounds.push(SparsifyRound {
        round: 0,
        coefficients: xi.clone(),
    });

    for round in 1..=opts.n_iter {
        xi = threshold_and_refit(&xi, opts.threshold, |state, active| {
            let target = dxdt.column(state).into_owned();
            solve_least_squares(&active.gather_columns(theta), &target)
        })?;
        debug!("stlsq round {round}: support sizes {:?}", support_sizes(&xi));
        rounds.push(SparsifyRound {
            round,
            coefficients: xi.clone(),
        });
    }

    Ok(SparseFit {
        coefficients: xi,
        rounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::polynomial_library;

    fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| a + (b - a) * i as f64 / (n - 1) as f64).collect()
    }

    /// Columns `[x, x², x³]`.
    fn odd_even_library(x: &[f64]) -> DMatrix<f64> {
        DMatrix::from_fn(x.len(), 3, |i, j| x[i].powi(j as i32 + 1))
    }

    #[test]
    fn three_point_linear_target_prunes_square_term() {
        // On x = -1, 0, 1 the x and x³ columns coincide. The minimum-norm solve
        // splits the weight between them; x² is pruned.
        let x = [-1.0, 0.0, 1.0];
        let theta = odd_even_library(&x);
        let dxdt = DMatrix::from_column_slice(3, 1, &[-1.0, 0.0, 1.0]);

        let xi = stlsq(&theta, &dxdt, &StlsqOptions::new(0.05)).unwrap();
        assert!((xi[(0, 0)] - 0.5).abs() < 1e-10);
        assert_eq!(xi[(1, 0)], 0.0);
        assert!((xi[(2, 0)] - 0.5).abs() < 1e-10);
        assert!((xi[(0, 0)] + xi[(2, 0)] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn dense_grid_linear_target_keeps_only_linear_term() {
        let x = linspace(-1.0, 1.0, 21);
        let theta = odd_even_library(&x);
        let dxdt = DMatrix::from_column_slice(x.len(), 1, &x);

        let xi = stlsq(&theta, &dxdt, &StlsqOptions::new(0.05)).unwrap();
        assert!((xi[(0, 0)] - 1.0).abs() < 1e-10);
        assert_eq!(xi[(1, 0)], 0.0);
        assert_eq!(xi[(2, 0)], 0.0);
    }

    #[test]
    fn zero_threshold_reproduces_least_squares() {
        let x = linspace(-1.0, 1.0, 15);
        let theta = polynomial_library(&x, 2);
        let y: Vec<f64> = x
            .iter()
            .map(|v| 1.0 + 0.5 * v + 0.1 * v * v + 0.01 * (7.0 * v).sin())
            .collect();
        let dxdt = DMatrix::from_column_slice(x.len(), 1, &y);

        let lsq = solve_least_squares_multi(&theta, &dxdt).unwrap();
        let fit = stlsq_with_trace(&theta, &dxdt, &StlsqOptions::new(0.0)).unwrap();
        for i in 0..3 {
            assert!(fit.coefficients[(i, 0)] != 0.0);
            assert!((fit.coefficients[(i, 0)] - lsq[(i, 0)]).abs() < 1e-10);
        }
    }

    #[test]
    fn threshold_above_every_coefficient_zeroes_everything() {
        let x = linspace(-1.0, 1.0, 11);
        let theta = polynomial_library(&x, 2);
        let y: Vec<f64> = x.iter().map(|v| 0.3 - 0.7 * v + 0.2 * v * v).collect();
        let dxdt = DMatrix::from_column_slice(x.len(), 1, &y);

        let fit = stlsq_with_trace(&theta, &dxdt, &StlsqOptions::new(10.0)).unwrap();
        for snapshot in &fit.rounds[1..] {
            assert!(snapshot.coefficients.iter().all(|v| *v == 0.0));
        }
        assert_eq!(fit.coefficients, DMatrix::zeros(3, 1));
    }

    #[test]
    fn states_are_pruned_independently() {
        let x = linspace(-1.0, 1.0, 25);
        let theta = polynomial_library(&x, 3);
        let mut dxdt = DMatrix::zeros(x.len(), 2);
        for (i, v) in x.iter().enumerate() {
            dxdt[(i, 0)] = 2.0 * v;
            dxdt[(i, 1)] = 0.5 - v * v;
        }

        let xi = stlsq(&theta, &dxdt, &StlsqOptions::new(0.1)).unwrap();
        let expected = DMatrix::from_row_slice(4, 2, &[0.0, 0.5, 2.0, 0.0, 0.0, -1.0, 0.0, 0.0]);
        for (a, b) in xi.iter().zip(expected.iter()) {
            if *b == 0.0 {
                assert_eq!(*a, 0.0);
            } else {
                assert!((a - b).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn runs_exactly_n_iter_rounds() {
        let x = linspace(-1.0, 1.0, 9);
        let theta = polynomial_library(&x, 1);
        let dxdt = DMatrix::from_column_slice(x.len(), 1, &x);

        let fit = stlsq_with_trace(&theta, &dxdt, &StlsqOptions::new(0.1)).unwrap();
        assert_eq!(fit.rounds.len(), 11);
        assert_eq!(fit.rounds.last().unwrap().round, 10);

        let fit = stlsq_with_trace(&theta, &dxdt, &StlsqOptions::new(0.1).with_n_iter(0)).unwrap();
        assert_eq!(fit.rounds.len(), 1);
    }

    #[test]
    fn zero_rounds_returns_unthresholded_fit() {
        let x = linspace(-1.0, 1.0, 9);
        let theta = polynomial_library(&x, 2);
        let y: Vec<f64> = x.iter().map(|v| 1.0 + 0.001 * v).collect();
        let dxdt = DMatrix::from_column_slice(x.len(), 1, &y);

        let xi = stlsq(&theta, &dxdt, &StlsqOptions::new(0.1).with_n_iter(0)).unwrap();
        assert!((xi[(1, 0)] - 0.001).abs() < 1e-10);
    }

    #[test]
    fn row_mismatch_is_rejected() {
        let theta = DMatrix::zeros(3, 2);
        let dxdt = DMatrix::zeros(4, 1);
        assert!(matches!(
            stlsq(&theta, &dxdt, &StlsqOptions::new(0.1)),
            Err(IdentError::InvalidInput(_))
        ));
    }
}
