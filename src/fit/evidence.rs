//! Bayesian evidence for a polynomial basis choice.
//!
//! For a set of powers `p_1, ..., p_m` the model is `y = Φ a + ε` with
//! `Φ[i, j] = x_i^(p_j)`, Gaussian prior `a ~ N(μ₀, Λ₀⁻¹)` and noise
//! `ε ~ N(0, β⁻¹ I)`. Everything is closed form:
//!
//! ```text
//! Λ_post = Λ₀ + β ΦᵀΦ
//! a_map  = Λ_post⁻¹ (Λ₀ μ₀ + β Φᵀ y)
//! C      = β⁻¹ I + Φ Λ₀⁻¹ Φᵀ
//! ln p(y) = -(n/2) ln 2π - ½ ln|C| - ½ yᵀ C⁻¹ y
//! ```
//!
//! The determinant term penalizes bases that spread prior mass over more
//! functions than the data needs, so comparing `ln p(y)` across power sets trades
//! fit against complexity. Higher is better.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::domain::{EvidenceResult, GaussianPrior, Power};
use crate::error::{IdentError, Result};
use crate::math::{invert_covariance, monomial_design, LuFactor};

/// MAP coefficients and log evidence for `selected_powers`.
///
/// Returns `(a_map, log_evidence)`; `a_map[j]` is the coefficient of
/// `x^selected_powers[j]`.
pub fn bayes_poly_map(
    selected_powers: &[Power],
    mean_prior: &DVector<f64>,
    inv_prior: &DMatrix<f64>,
    likelihood_precision: f64,
    x: &[f64],
    y: &[f64],
) -> Result<(DVector<f64>, f64)> {
    let prior = GaussianPrior {
        mean: mean_prior.clone(),
        precision: inv_prior.clone(),
    };
    let result = evidence(selected_powers, &prior, likelihood_precision, x, y)?;
    Ok((result.a_map, result.log_evidence))
}

/// Full evidence computation, including the posterior covariance.
pub fn evidence(
    selected_powers: &[Power],
    prior: &GaussianPrior,
    likelihood_precision: f64,
    x: &[f64],
    y: &[f64],
) -> Result<EvidenceResult> {
    let m = selected_powers.len();
    let n = x.len();
    if m == 0 {
        return Err(IdentError::invalid("no powers selected"));
    }
    if n == 0 || y.len() != n {
        return Err(IdentError::invalid(format!(
            "x and y must be non-empty and equal length (x={n}, y={})",
            y.len()
        )));
    }
    if prior.mean.len() != m || prior.precision.shape() != (m, m) {
        return Err(IdentError::invalid(format!(
            "prior has mean length {} and precision {:?}, expected {m} and ({m}, {m})",
            prior.mean.len(),
            prior.precision.shape()
        )));
    }
    if !(likelihood_precision.is_finite() && likelihood_precision > 0.0) {
        return Err(IdentError::invalid(format!(
            "likelihood precision must be finite and > 0, got {likelihood_precision}"
        )));
    }

    let phi = monomial_design(x, selected_powers);
    let y = DVector::from_column_slice(y);
    let phi_t = phi.transpose();

    let posterior_precision = &prior.precision + (&phi_t * &phi) * likelihood_precision;
    let posterior_covariance = invert_covariance(&posterior_precision, "posterior precision")?;
    let a_map = &posterior_covariance
        * (&prior.precision * &prior.mean + (&phi_t * &y) * likelihood_precision);

    let prior_covariance = invert_covariance(&prior.precision, "prior precision")?;
    let c = DMatrix::identity(n, n) / likelihood_precision + &phi * prior_covariance * &phi_t;

    let lu = LuFactor::new(c)?;
    let (sign, log_det) = lu.sign_log_det();
    if sign <= 0.0 {
        return Err(IdentError::NonPositiveDefiniteCovariance { matrix: "C" });
    }
    let c_inv_y = lu
        .solve(&y)
        .ok_or(IdentError::NonPositiveDefiniteCovariance { matrix: "C" })?;

    let log_evidence = -0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln()
        - 0.5 * log_det
        - 0.5 * y.dot(&c_inv_y);

    debug!("evidence for powers {selected_powers:?}: {log_evidence:.4}");

    Ok(EvidenceResult {
        powers: selected_powers.to_vec(),
        a_map,
        log_evidence,
        posterior_covariance,
    })
}
