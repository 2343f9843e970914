//! One threshold-and-refit round, shared by both sparsifiers.
//!
//! A round takes the previous coefficient snapshot and produces a new one:
//!
//! 1. every coefficient with `|ξ| < threshold` is zeroed (one global pass)
//! 2. each state column whose survivors are non-empty is refit on exactly those
//!    basis functions and the result written back to exactly those rows
//! 3. columns with no survivors stay all-zero and are not refit
//!
//! Refits of different state columns are independent within a round, so they run
//! in parallel. Results are collected in state order and applied after all refits
//! finish, so the output does not depend on scheduling.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::ActiveSet;
use crate::error::Result;

/// Run one round over `previous`, refitting each state with `refit(state, active)`.
///
/// `refit` must return one coefficient per index of `active`, in active order.
pub fn threshold_and_refit<F>(previous: &DMatrix<f64>, threshold: f64, refit: F) -> Result<DMatrix<f64>>
where
    F: Fn(usize, &ActiveSet) -> Result<DVector<f64>> + Sync,
{
    let mut next = previous.map(|v| if v.abs() < threshold { 0.0 } else { v });

    let actives: Vec<ActiveSet> = (0..previous.ncols())
        .map(|state| ActiveSet::surviving(previous, state, threshold))
        .collect();

    let refits: Vec<Option<DVector<f64>>> = actives
        .par_iter()
        .enumerate()
        .map(|(state, active)| {
            if active.is_empty() {
                return Ok(None);
            }
            refit(state, active).map(Some)
        })
        .collect::<Result<_>>()?;

    for (state, (active, values)) in actives.iter().zip(refits).enumerate() {
        if let Some(values) = values {
            active.scatter(&values, &mut next, state)?;
        }
    }

    Ok(next)
}

/// Fit every state column on the full basis, in parallel.
pub fn fit_all_states<F>(n_basis: usize, n_states: usize, fit: F) -> Result<DMatrix<f64>>
where
    F: Fn(usize, &ActiveSet) -> Result<DVector<f64>> + Sync,
{
    let full = ActiveSet::full(n_basis);
    let columns: Vec<DVector<f64>> = (0..n_states)
        .into_par_iter()
        .map(|state| fit(state, &full))
        .collect::<Result<_>>()?;

    let mut out = DMatrix::zeros(n_basis, n_states);
    for (state, column) in columns.iter().enumerate() {
        full.scatter(column, &mut out, state)?;
    }
    Ok(out)
}
