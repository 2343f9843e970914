//! Evaluation of polynomial models and their coefficient derivatives.
//!
//! Two coefficient orders appear in the crate:
//!
//! - `solve_poly` takes coefficients highest degree first,
//!   `y(x) = a₀ x^(N-1) + a₁ x^(N-2) + ... + a_(N-1)`
//! - `predict` takes a coefficient column in ascending power order, which is the
//!   row order of every coefficient matrix the sparsifiers return
//!
//! The model is linear in its coefficients, so the gradient with respect to the
//! coefficients is the vector of monomials and the Hessian is identically zero.

use nalgebra::{DMatrix, DVector};

/// Value and coefficient derivatives of a polynomial at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyEval {
    pub value: f64,
    /// `dy/da` as an N×1 column.
    pub gradient: DMatrix<f64>,
    /// `d²y/da²`, always zero.
    pub hessian: DMatrix<f64>,
}

/// Evaluate `a` (highest degree first) at `x`.
pub fn solve_poly(a: &[f64], x: f64) -> PolyEval {
    let n = a.len();
    let gradient = DMatrix::from_fn(n, 1, |j, _| x.powi((n - 1 - j) as i32));
    let value: f64 = a
        .iter()
        .zip(gradient.iter())
        .map(|(c, m)| c * m)
        .sum();
    PolyEval {
        value,
        gradient,
        hessian: DMatrix::zeros(n, n),
    }
}

/// `solve_poly` at every point of `xs`.
pub fn solve_poly_many(a: &[f64], xs: &[f64]) -> Vec<PolyEval> {
    xs.iter().map(|&x| solve_poly(a, x)).collect()
}

/// Evaluate ascending-power coefficients `coefficients[p] · x^p` at `x`.
pub fn predict(coefficients: &[f64], x: f64) -> f64 {
    // Horner from the top degree down.
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Evaluate column `state` of a coefficient matrix at every point of `xs`.
pub fn predict_state(coefficients: &DMatrix<f64>, state: usize, xs: &[f64]) -> DVector<f64> {
    let column: Vec<f64> = coefficients.column(state).iter().copied().collect();
    DVector::from_iterator(xs.len(), xs.iter().map(|&x| predict(&column, x)))
}
