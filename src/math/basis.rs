//! Polynomial basis construction.
//!
//! Two flavours of single-variable polynomial basis are used:
//!
//! - raw monomials `x^p`, for the evidence computation and for callers building a
//!   design matrix for the OLS sparsifier
//! - monomials rescaled by an L2 normalization constant on `[-1, 1]`, for the
//!   errors-in-variables sparsifier
//!
//! The normalization constant for degree `p` is `sqrt((2p + 1) / 2)`, the factor
//! that makes the degree-`p` Legendre polynomial unit-norm on `[-1, 1]`. Scaling the
//! columns this way keeps a single pruning threshold comparable across degrees.

use nalgebra::DMatrix;

use crate::domain::{ActiveSet, Power};

/// Design matrix with one column `x^p` per entry of `powers`, in the given order.
pub fn monomial_design(x: &[f64], powers: &[Power]) -> DMatrix<f64> {
    DMatrix::from_fn(x.len(), powers.len(), |i, j| x[i].powi(powers[j] as i32))
}

/// Design matrix with columns `x^0, x^1, ..., x^deg`.
pub fn polynomial_library(x: &[f64], deg: Power) -> DMatrix<f64> {
    DMatrix::from_fn(x.len(), deg as usize + 1, |i, p| x[i].powi(p as i32))
}

/// L2([-1, 1]) normalization factors, indexed by degree: `sqrt((2p + 1) / 2)`.
pub fn l2_norm_factors(deg: Power) -> Vec<f64> {
    (0..=deg).map(|p| (f64::from(2 * p + 1) / 2.0).sqrt()).collect()
}

/// Normalized basis restricted to `active` degrees: column `j` is
/// `factors[p_j] · x^p_j` with `p_j = active.indices()[j]`.
pub fn normalized_design(x: &[f64], active: &ActiveSet, factors: &[f64]) -> DMatrix<f64> {
    let powers = active.powers();
    DMatrix::from_fn(x.len(), powers.len(), |i, j| {
        let p = powers[j];
        factors[p as usize] * x[i].powi(p as i32)
    })
}
