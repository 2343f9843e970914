//! Orthogonal distance regression (errors-in-variables least squares).
//!
//! Given samples `(x_i, y_i)` with noise standard deviations `sx_i`, `sy_i`, we fit
//! a model `f(x; β)` by minimizing over both `β` and per-sample input corrections
//! `δ_i`:
//!
//! ```text
//! S(β, δ) = Σ_i ((f(x_i + δ_i; β) - y_i) / sy_i)² + (δ_i / sx_i)²
//! ```
//!
//! This is an ordinary nonlinear least-squares problem in the joint vector
//! `(β, δ)` with `2n` residuals, handed to the `levenberg_marquardt` crate:
//!
//! - `sstol` is its `ftol` (relative reduction of `S`)
//! - `partol` is its `xtol` (relative step size)
//! - `max_iter` caps both the Jacobian evaluations and the crate's patience
//!
//! The joint Jacobian is dense (`2n × (p + n)`), so memory grows quadratically
//! with the number of samples. Running out of iterations is an error; callers do
//! not get a best-effort result back.

use std::cell::Cell;

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::trace;
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::domain::{OdrSettings, Power};
use crate::error::{IdentError, Result};

/// A model the ODR solver can fit: value, parameter gradient and input derivative.
pub trait OdrModel {
    fn n_params(&self) -> usize;

    /// `f(x; β)`.
    fn value(&self, beta: &DVector<f64>, x: f64) -> f64;

    /// `∂f/∂β` at `x`, written into `out` (length `n_params`).
    fn param_gradient(&self, beta: &DVector<f64>, x: f64, out: &mut [f64]);

    /// `∂f/∂x` at `x`.
    fn x_derivative(&self, beta: &DVector<f64>, x: f64) -> f64;
}

/// Polynomial `Σ_j β_j · scale_j · x^(p_j)` over an explicit list of powers.
#[derive(Debug, Clone)]
pub struct ScaledPolynomial {
    powers: Vec<Power>,
    scales: Vec<f64>,
}

impl ScaledPolynomial {
    pub fn new(powers: Vec<Power>, scales: Vec<f64>) -> Result<Self> {
        if powers.len() != scales.len() {
            return Err(IdentError::invalid(format!(
                "{} powers but {} scales",
                powers.len(),
                scales.len()
            )));
        }
        Ok(Self { powers, scales })
    }
}

impl OdrModel for ScaledPolynomial {
    fn n_params(&self) -> usize {
        self.powers.len()
    }

    fn value(&self, beta: &DVector<f64>, x: f64) -> f64 {
        self.powers
            .iter()
            .zip(self.scales.iter())
            .zip(beta.iter())
            .map(|((&p, &s), &b)| b * s * x.powi(p as i32))
            .sum()
    }

    fn param_gradient(&self, _beta: &DVector<f64>, x: f64, out: &mut [f64]) {
        for (j, (&p, &s)) in self.powers.iter().zip(self.scales.iter()).enumerate() {
            out[j] = s * x.powi(p as i32);
        }
    }

    fn x_derivative(&self, beta: &DVector<f64>, x: f64) -> f64 {
        self.powers
            .iter()
            .zip(self.scales.iter())
            .zip(beta.iter())
            .filter(|((p, _), _)| **p > 0)
            .map(|((&p, &s), &b)| b * s * p as f64 * x.powi(p as i32 - 1))
            .sum()
    }
}

/// Result of one ODR fit.
#[derive(Debug, Clone)]
pub struct OdrFit {
    pub beta: DVector<f64>,
    /// Estimated input corrections, one per sample.
    pub delta: DVector<f64>,
    /// Weighted sum of squares `S(β, δ)` at the solution.
    pub sum_of_squares: f64,
    /// Jacobian evaluations (outer iterations) used.
    pub iterations: usize,
}

/// The ODR objective as a least-squares problem in `[β; δ]`.
///
/// Residuals are `wy_i (f(x_i + δ_i; β) - y_i)` for the first `n` rows and
/// `wx_i δ_i` for the last `n`, with weights the inverse standard deviations.
struct JointProblem<'a, M> {
    model: &'a M,
    x: &'a [f64],
    y: &'a [f64],
    wx: Vec<f64>,
    wy: Vec<f64>,
    params: DVector<f64>,
    max_iter: usize,
    iterations: Cell<usize>,
    exhausted: Cell<bool>,
}

impl<M: OdrModel> JointProblem<'_, M> {
    fn beta(&self) -> DVector<f64> {
        self.params.rows(0, self.model.n_params()).into_owned()
    }

    fn delta(&self) -> DVector<f64> {
        self.params
            .rows(self.model.n_params(), self.x.len())
            .into_owned()
    }

    fn sum_of_squares(&self) -> f64 {
        self.residuals().map_or(f64::INFINITY, |r| r.norm_squared())
    }
}

impl<M: OdrModel> LeastSquaresProblem<f64, Dyn, Dyn> for JointProblem<'_, M> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, params: &DVector<f64>) {
        self.params.copy_from(params);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let n = self.x.len();
        let p = self.model.n_params();
        let beta = self.beta();
        let mut r = DVector::zeros(2 * n);
        for i in 0..n {
            let delta = self.params[p + i];
            r[i] = self.wy[i] * (self.model.value(&beta, self.x[i] + delta) - self.y[i]);
            r[n + i] = self.wx[i] * delta;
        }
        Some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        // One Jacobian per outer iteration; refusing it stops the minimizer.
        let used = self.iterations.get();
        if used >= self.max_iter {
            self.exhausted.set(true);
            return None;
        }
        self.iterations.set(used + 1);

        let n = self.x.len();
        let p = self.model.n_params();
        let beta = self.beta();
        let mut jac = DMatrix::zeros(2 * n, p + n);
        let mut grad = vec![0.0; p];
        for i in 0..n {
            let xi = self.x[i] + self.params[p + i];
            self.model.param_gradient(&beta, xi, &mut grad);
            for (j, g) in grad.iter().enumerate() {
                jac[(i, j)] = self.wy[i] * g;
            }
            jac[(i, p + i)] = self.wy[i] * self.model.x_derivative(&beta, xi);
            jac[(n + i, p + i)] = self.wx[i];
        }
        Some(jac)
    }
}

/// Fit `model` to `(x, y)` by orthogonal distance regression starting from `beta0`.
///
/// `sx` and `sy` are per-sample standard deviations and must be finite and > 0.
pub fn solve_odr<M: OdrModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    sx: &[f64],
    sy: &[f64],
    beta0: DVector<f64>,
    settings: &OdrSettings,
) -> Result<OdrFit> {
    let n = x.len();
    let p = model.n_params();
    if n == 0 {
        return Err(IdentError::solver("no samples"));
    }
    if p == 0 {
        return Err(IdentError::solver("model has no parameters"));
    }
    if y.len() != n || sx.len() != n || sy.len() != n {
        return Err(IdentError::solver(format!(
            "length mismatch: x={n}, y={}, sx={}, sy={}",
            y.len(),
            sx.len(),
            sy.len()
        )));
    }
    if beta0.len() != p {
        return Err(IdentError::solver(format!(
            "initial guess has {} parameters, model has {p}",
            beta0.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(IdentError::solver("non-finite sample values"));
    }
    if sx.iter().chain(sy.iter()).any(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(IdentError::solver("standard deviations must be finite and > 0"));
    }
    settings.validate()?;

    let mut params = DVector::zeros(p + n);
    params.rows_mut(0, p).copy_from(&beta0);
    let problem = JointProblem {
        model,
        x,
        y,
        wx: sx.iter().map(|s| 1.0 / s).collect(),
        wy: sy.iter().map(|s| 1.0 / s).collect(),
        params,
        max_iter: settings.max_iter,
        iterations: Cell::new(0),
        exhausted: Cell::new(false),
    };
    if !problem.sum_of_squares().is_finite() {
        return Err(IdentError::solver("initial sum of squares is not finite"));
    }

    let (problem, report) = LevenbergMarquardt::new()
        .with_ftol(settings.sstol)
        .with_xtol(settings.partol)
        .with_stepbound(settings.step_bound)
        .with_patience(settings.max_iter)
        .minimize(problem);

    let iterations = problem.iterations.get();
    let sum_of_squares = problem.sum_of_squares();
    trace!(
        "odr: {:?} after {iterations} iterations, {} evaluations (S={sum_of_squares:.6e})",
        report.termination, report.number_of_evaluations
    );

    match report.termination {
        TerminationReason::ResidualsZero
        | TerminationReason::Orthogonal
        | TerminationReason::Converged { .. }
        | TerminationReason::NoImprovementPossible(_) => {}
        TerminationReason::LostPatience => {
            return Err(IdentError::FitDidNotConverge {
                iterations,
                sum_of_squares,
            });
        }
        TerminationReason::User(_) if problem.exhausted.get() => {
            return Err(IdentError::FitDidNotConverge {
                iterations,
                sum_of_squares,
            });
        }
        other => return Err(IdentError::solver(format!("minimizer stopped: {other:?}"))),
    }

    if !sum_of_squares.is_finite() {
        return Err(IdentError::solver("final sum of squares is not finite"));
    }

    Ok(OdrFit {
        beta: problem.beta(),
        delta: problem.delta(),
        sum_of_squares,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> ScaledPolynomial {
        ScaledPolynomial::new(vec![0, 1], vec![1.0, 1.0]).unwrap()
    }

    #[test]
    fn scaled_polynomial_derivatives() {
        let model = ScaledPolynomial::new(vec![0, 2], vec![2.0, 3.0]).unwrap();
        let beta = DVector::from_vec(vec![1.0, 0.5]);
        // f = 2 + 1.5 x²
        assert!((model.value(&beta, 2.0) - 8.0).abs() < 1e-12);
        assert!((model.x_derivative(&beta, 2.0) - 6.0).abs() < 1e-12);
        let mut g = [0.0; 2];
        model.param_gradient(&beta, 2.0, &mut g);
        assert_eq!(g, [2.0, 12.0]);
    }

    #[test]
    fn exact_line_converges_immediately() {
        let x: Vec<f64> = (0..11).map(|i| -1.0 + 0.2 * i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.0 + 2.0 * v).collect();
        let s = vec![0.1; x.len()];
        let fit = solve_odr(
            &line(),
            &x,
            &y,
            &s,
            &s,
            DVector::from_vec(vec![1.0, 2.0]),
            &OdrSettings::default(),
        )
        .unwrap();
        assert!((fit.beta[0] - 1.0).abs() < 1e-9);
        assert!((fit.beta[1] - 2.0).abs() < 1e-9);
        assert!(fit.sum_of_squares < 1e-20);
    }

    #[test]
    fn recovers_line_from_poor_start() {
        let x: Vec<f64> = (0..21).map(|i| -1.0 + 0.1 * i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| -0.5 + 3.0 * v).collect();
        let s = vec![0.05; x.len()];
        let fit = solve_odr(
            &line(),
            &x,
            &y,
            &s,
            &s,
            DVector::from_vec(vec![0.0, 0.0]),
            &OdrSettings::default(),
        )
        .unwrap();
        assert!((fit.beta[0] + 0.5).abs() < 1e-6);
        assert!((fit.beta[1] - 3.0).abs() < 1e-6);
        assert!(fit.iterations > 0);
    }

    #[test]
    fn orthogonal_fit_is_steeper_than_ols_under_x_noise() {
        // Points scattered symmetrically about y = x with equal noise in both axes.
        // OLS attenuates the slope; ODR with equal weights recovers the major axis.
        let x = [-1.0, -0.8, -0.2, 0.1, 0.3, 0.9, 1.1, -1.1];
        let y = [-0.8, -1.0, 0.1, -0.2, 0.5, 0.7, 0.9, -0.9];
        let s = vec![0.1; x.len()];

        let theta = crate::math::polynomial_library(&x, 1);
        let ols = crate::math::solve_least_squares(&theta, &DVector::from_row_slice(&y)).unwrap();

        let fit = solve_odr(&line(), &x, &y, &s, &s, ols.clone(), &OdrSettings::default()).unwrap();
        assert!(fit.beta[1] > ols[1]);
        assert!(fit.sum_of_squares.is_finite());
    }

    #[test]
    fn zero_uncertainty_is_a_solver_error() {
        let err = solve_odr(
            &line(),
            &[0.0, 1.0],
            &[0.0, 1.0],
            &[0.0, 0.0],
            &[0.1, 0.1],
            DVector::from_vec(vec![0.0, 1.0]),
            &OdrSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IdentError::SolverError(_)));
    }

    #[test]
    fn iteration_limit_is_reported() {
        let x: Vec<f64> = (0..21).map(|i| -1.0 + 0.1 * i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 0.3 + v * v * v).collect();
        let cubic = ScaledPolynomial::new(vec![0, 3], vec![1.0, 1.0]).unwrap();
        let s = vec![0.01; x.len()];
        let settings = OdrSettings {
            max_iter: 1,
            ..OdrSettings::default()
        };
        let err = solve_odr(&cubic, &x, &y, &s, &s, DVector::from_vec(vec![5.0, -5.0]), &settings)
            .unwrap_err();
        assert!(matches!(err, IdentError::FitDidNotConverge { iterations: 1, .. }));
    }

    #[test]
    fn non_finite_start_is_a_solver_error() {
        let cubic = ScaledPolynomial::new(vec![3], vec![1.0]).unwrap();
        let x = [10.0, 20.0];
        let s = [0.1, 0.1];
        let err = solve_odr(&cubic, &x, &[0.0, 0.0], &s, &s, DVector::from_vec(vec![1e300]), &OdrSettings::default())
            .unwrap_err();
        assert!(matches!(err, IdentError::SolverError(_)));
    }

    #[test]
    fn iterations_stay_within_limit() {
        let x: Vec<f64> = (0..15).map(|i| -1.0 + i as f64 / 7.0).collect();
        let y: Vec<f64> = x.iter().map(|v| 0.2 + 1.5 * v + 0.05 * (9.0 * v).sin()).collect();
        let s = vec![0.05; x.len()];
        let settings = OdrSettings {
            max_iter: 20,
            ..OdrSettings::default()
        };
        let fit = solve_odr(&line(), &x, &y, &s, &s, DVector::from_vec(vec![0.0, 1.0]), &settings).unwrap();
        assert!(fit.iterations >= 1 && fit.iterations <= 20);
        assert_eq!(fit.delta.len(), x.len());
    }
}
