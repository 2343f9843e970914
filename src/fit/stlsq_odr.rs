//! STLSQ with errors-in-variables refits over a normalized polynomial basis.
//!
//! Same sparsification policy as `fit::stlsq`, with two differences:
//!
//! - every fit (initial and refit) is an orthogonal distance regression that
//!   treats both `x` (std-dev `sx`) and `dx/dt` (std-dev `sy`) as noisy
//! - the basis is `factor[p] · x^p` with `factor[p] = sqrt((2p + 1) / 2)`, and
//!   the threshold is applied to coefficients in that basis
//!
//! Raw monomial coefficients grow or shrink with the scale of `x^p`, so a single
//! threshold on them prunes high and low degrees unevenly. Coefficients stay
//! normalized for the whole loop and are converted to standard monomial
//! coefficients (`β[p] = ξ[p] · factor[p]`) once, on output.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::domain::{support_sizes, ActiveSet, OdrSettings, Power, SparseOdrFit, SparsifyRound, StlsqOdrOptions};
use crate::error::{IdentError, Result};
use crate::fit::sparsify::{fit_all_states, threshold_and_refit};
use crate::math::{l2_norm_factors, normalized_design, solve_least_squares, solve_odr, ScaledPolynomial};

/// Errors-in-variables fit of `y` on the normalized basis restricted to `active`.
///
/// Returns normalized coefficients, one per active power, in active order. When
/// `beta0` is `None` the starting point is the least-squares solution on the same
/// normalized columns. `sx` and `sy` are per-sample standard deviations.
pub fn odr_fit_powers(
    x: &[f64],
    y: &[f64],
    active: &ActiveSet,
    factors: &[f64],
    beta0: Option<DVector<f64>>,
    sx: &[f64],
    sy: &[f64],
    settings: &OdrSettings,
) -> Result<DVector<f64>> {
    if let Some(&p) = active.indices().iter().find(|&&p| p >= factors.len()) {
        return Err(IdentError::invalid(format!(
            "power {p} has no normalization factor (max degree {})",
            factors.len().saturating_sub(1)
        )));
    }

    let beta0 = match beta0 {
        Some(b) => b,
        None => {
            let theta = normalized_design(x, active, factors);
            solve_least_squares(&theta, &DVector::from_column_slice(y))?
        }
    };

    let scales = active.indices().iter().map(|&p| factors[p]).collect();
    let model = ScaledPolynomial::new(active.powers(), scales)?;

    let fit = solve_odr(&model, x, y, sx, sy, beta0, settings)?;
    Ok(fit.beta)
}

/// Standard monomial coefficients `β` ((deg + 1) × n_states).
pub fn stlsq_odr(x: &[f64], dxdt: &DMatrix<f64>, deg: Power, opts: &StlsqOdrOptions) -> Result<DMatrix<f64>> {
    Ok(stlsq_odr_with_trace(x, dxdt, deg, opts)?.coefficients)
}

/// Errors-in-variables STLSQ returning both coefficient representations and the
/// per-round snapshots (normalized basis).
pub fn stlsq_odr_with_trace(
    x: &[f64],
    dxdt: &DMatrix<f64>,
    deg: Power,
    opts: &StlsqOdrOptions,
) -> Result<SparseOdrFit> {
    opts.validate()?;
    let n = x.len();
    if n == 0 {
        return Err(IdentError::invalid("no samples"));
    }
    if dxdt.nrows() != n {
        return Err(IdentError::invalid(format!(
            "x has {n} samples but dXdt has {} rows",
            dxdt.nrows()
        )));
    }
    if dxdt.ncols() == 0 {
        return Err(IdentError::invalid("dXdt has no state columns"));
    }

    let sx = opts.sx.per_sample(n)?;
    let sy = opts.sy.per_sample(n)?;
    let factors = l2_norm_factors(deg);
    let targets: Vec<Vec<f64>> = dxdt
        .column_iter()
        .map(|c| c.iter().copied().collect())
        .collect();

    let refit = |state: usize, active: &ActiveSet| {
        odr_fit_powers(x, &targets[state], active, &factors, None, &sx, &sy, &opts.solver)
    };

    let mut xi_norm = fit_all_states(deg as usize + 1, dxdt.ncols(), &refit)?;
    let mut rounds = Vec::with_capacity(opts.n_iter + 1);
    rounds.push(SparsifyRound {
        round: 0,
        coefficients: xi_norm.clone(),
    });

    for round in 1..=opts.n_iter {
        xi_norm = threshold_and_refit(&xi_norm, opts.threshold, &refit)?;
        debug!("stlsq_odr round {round}: support sizes {:?}", support_sizes(&xi_norm));
        rounds.push(SparsifyRound {
            round,
            coefficients: xi_norm.clone(),
        });
    }

    let mut coefficients = xi_norm.clone();
    for (p, mut row) in coefficients.row_iter_mut().enumerate() {
        row *= factors[p];
    }

    Ok(SparseOdrFit {
        coefficients,
        normalized: xi_norm,
        factors,
        rounds,
    })
}
