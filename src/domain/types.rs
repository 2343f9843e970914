//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - built in code with sensible defaults
//! - loaded from JSON/TOML by a caller that wants file-based configuration
//! - returned alongside fits as a record of what was run

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{IdentError, Result};

/// Number of sparsification rounds run after the initial fit.
pub const DEFAULT_N_ITER: usize = 10;

/// Assumed measurement noise standard deviation in the state `x`.
pub const DEFAULT_SX: f64 = 0.06;

/// Assumed measurement noise standard deviation in the derivative `dx/dt`.
pub const DEFAULT_SY: f64 = 0.1;

/// ODR iteration limit (ODRPACK's default).
pub const DEFAULT_ODR_MAX_ITER: usize = 50;

/// Initial trust-region bound of the ODR minimizer, as a factor of the scaled
/// parameter norm (MINPACK's default).
pub const DEFAULT_ODR_STEP_BOUND: f64 = 100.0;

/// Exponent of a monomial basis function `x^p`.
pub type Power = u32;

fn default_n_iter() -> usize {
    DEFAULT_N_ITER
}

/// Measurement uncertainty: one standard deviation for every sample, or one per sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Uncertainty {
    Scalar(f64),
    PerSample(Vec<f64>),
}

impl Uncertainty {
    /// Expand to one standard deviation per sample.
    ///
    /// Every value must be finite and strictly positive: a zero standard deviation
    /// would give that sample an infinite weight.
    pub fn per_sample(&self, n: usize) -> Result<Vec<f64>> {
        let values = match self {
            Uncertainty::Scalar(s) => vec![*s; n],
            Uncertainty::PerSample(v) => {
                if v.len() != n {
                    return Err(IdentError::solver(format!(
                        "uncertainty has {} entries but there are {n} samples",
                        v.len()
                    )));
                }
                v.clone()
            }
        };
        if let Some(bad) = values.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(IdentError::solver(format!(
                "uncertainty must be finite and > 0, got {bad}"
            )));
        }
        Ok(values)
    }
}

impl From<f64> for Uncertainty {
    fn from(value: f64) -> Self {
        Uncertainty::Scalar(value)
    }
}

impl From<Vec<f64>> for Uncertainty {
    fn from(value: Vec<f64>) -> Self {
        Uncertainty::PerSample(value)
    }
}

/// Options for ordinary least-squares sparsification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StlsqOptions {
    /// Pruning threshold: coefficients with `|ξ| < threshold` are zeroed.
    pub threshold: f64,
    /// Number of threshold-and-refit rounds. Always run in full.
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
}

impl StlsqOptions {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            n_iter: DEFAULT_N_ITER,
        }
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)
    }
}

/// Tuning for the orthogonal distance solver.
///
/// Defaults follow ODRPACK: `sstol = sqrt(eps)`, `partol = eps^(2/3)`, 50 iterations.
/// `max_iter` bounds the minimizer's outer iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdrSettings {
    pub max_iter: usize,
    /// Relative sum-of-squares reduction below which the fit is converged.
    pub sstol: f64,
    /// Relative step size below which the fit is converged.
    pub partol: f64,
    /// Initial trust-region bound factor.
    pub step_bound: f64,
}

impl Default for OdrSettings {
    fn default() -> Self {
        Self {
            max_iter: DEFAULT_ODR_MAX_ITER,
            sstol: f64::EPSILON.sqrt(),
            partol: f64::EPSILON.powf(2.0 / 3.0),
            step_bound: DEFAULT_ODR_STEP_BOUND,
        }
    }
}

impl OdrSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(IdentError::invalid("Invalid max_iter setting (must be >= 1)."));
        }
        if !(self.sstol.is_finite() && self.sstol > 0.0) {
            return Err(IdentError::invalid("Invalid sstol setting."));
        }
        if !(self.partol.is_finite() && self.partol > 0.0) {
            return Err(IdentError::invalid("Invalid partol setting."));
        }
        if !(self.step_bound.is_finite() && self.step_bound > 0.0) {
            return Err(IdentError::invalid("Invalid step_bound setting."));
        }
        Ok(())
    }
}

/// Options for errors-in-variables sparsification over a polynomial basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StlsqOdrOptions {
    /// Pruning threshold, applied to coefficients in the normalized basis.
    pub threshold: f64,
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    /// Noise standard deviation in `x`.
    #[serde(default = "default_sx")]
    pub sx: Uncertainty,
    /// Noise standard deviation in `dx/dt`.
    #[serde(default = "default_sy")]
    pub sy: Uncertainty,
    #[serde(default)]
    pub solver: OdrSettings,
}

fn default_sx() -> Uncertainty {
    Uncertainty::Scalar(DEFAULT_SX)
}

fn default_sy() -> Uncertainty {
    Uncertainty::Scalar(DEFAULT_SY)
}

impl StlsqOdrOptions {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            n_iter: DEFAULT_N_ITER,
            sx: default_sx(),
            sy: default_sy(),
            solver: OdrSettings::default(),
        }
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn with_noise(mut self, sx: impl Into<Uncertainty>, sy: impl Into<Uncertainty>) -> Self {
        self.sx = sx.into();
        self.sy = sy.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)?;
        self.solver.validate()
    }
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if !(threshold.is_finite() && threshold >= 0.0) {
        return Err(IdentError::invalid(format!(
            "Invalid threshold setting: {threshold} (must be finite and >= 0)."
        )));
    }
    Ok(())
}

/// Ordered list of basis indices that survived thresholding for one state.
///
/// Coefficient sub-vectors are always paired with the `ActiveSet` they were fit on,
/// so gathering design columns and scattering results never depends on positional
/// convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSet {
    indices: Vec<usize>,
}

impl ActiveSet {
    /// All indices `0..n`.
    pub fn full(n: usize) -> Self {
        Self {
            indices: (0..n).collect(),
        }
    }

    /// Indices of column `state` whose coefficients survive `|ξ| >= threshold`.
    pub fn surviving(coefficients: &DMatrix<f64>, state: usize, threshold: f64) -> Self {
        let indices = coefficients
            .column(state)
            .iter()
            .enumerate()
            .filter(|(_, v)| !(v.abs() < threshold))
            .map(|(i, _)| i)
            .collect();
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Active indices read as monomial powers (index `p` of a polynomial library is `x^p`).
    pub fn powers(&self) -> Vec<Power> {
        self.indices.iter().map(|&i| i as Power).collect()
    }

    /// Design matrix restricted to the active columns, in active order.
    pub fn gather_columns(&self, theta: &DMatrix<f64>) -> DMatrix<f64> {
        theta.select_columns(self.indices.iter())
    }

    /// Write `values` (one per active index) into column `state` of `target`.
    pub fn scatter(&self, values: &DVector<f64>, target: &mut DMatrix<f64>, state: usize) -> Result<()> {
        if values.len() != self.indices.len() {
            return Err(IdentError::invalid(format!(
                "refit returned {} coefficients for {} active basis functions",
                values.len(),
                self.indices.len()
            )));
        }
        if state >= target.ncols() || self.indices.iter().any(|&row| row >= target.nrows()) {
            return Err(IdentError::invalid(format!(
                "active set does not fit a {}x{} coefficient matrix",
                target.nrows(),
                target.ncols()
            )));
        }
        for (&row, &v) in self.indices.iter().zip(values.iter()) {
            target[(row, state)] = v;
        }
        Ok(())
    }
}

/// Coefficient snapshot taken at the end of one sparsification round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparsifyRound {
    /// 1-based round number (round 0 is the initial fit).
    pub round: usize,
    pub coefficients: DMatrix<f64>,
}

impl SparsifyRound {
    /// Number of nonzero coefficients per state.
    pub fn support_sizes(&self) -> Vec<usize> {
        support_sizes(&self.coefficients)
    }
}

pub(crate) fn support_sizes(coefficients: &DMatrix<f64>) -> Vec<usize> {
    coefficients
        .column_iter()
        .map(|c| c.iter().filter(|v| **v != 0.0).count())
        .collect()
}

/// Output of ordinary least-squares sparsification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseFit {
    /// Final coefficients (n_basis × n_states).
    pub coefficients: DMatrix<f64>,
    /// Snapshot after the initial fit and after every round.
    pub rounds: Vec<SparsifyRound>,
}

/// Output of errors-in-variables sparsification.
///
/// `normalized` holds the coefficients the threshold was applied to;
/// `coefficients` holds the standard monomial coefficients
/// (`coefficients[(p, k)] = normalized[(p, k)] * factors[p]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseOdrFit {
    pub coefficients: DMatrix<f64>,
    pub normalized: DMatrix<f64>,
    pub factors: Vec<f64>,
    /// Snapshots in the normalized basis.
    pub rounds: Vec<SparsifyRound>,
}

impl SparseOdrFit {
    /// Recover normalized coefficients from standard ones.
    ///
    /// `coefficients` must have one row per normalization factor.
    pub fn normalize(&self, coefficients: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if coefficients.nrows() != self.factors.len() {
            return Err(IdentError::invalid(format!(
                "expected {} coefficient rows (degree {}), got {}",
                self.factors.len(),
                self.factors.len().saturating_sub(1),
                coefficients.nrows()
            )));
        }
        let mut out = coefficients.clone();
        for (p, mut row) in out.row_iter_mut().enumerate() {
            row /= self.factors[p];
        }
        Ok(out)
    }
}

/// Gaussian prior over polynomial coefficients, given by mean and precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianPrior {
    pub mean: DVector<f64>,
    pub precision: DMatrix<f64>,
}

impl GaussianPrior {
    /// Zero-mean prior with precision `precision * I`.
    pub fn isotropic(dim: usize, precision: f64) -> Self {
        Self {
            mean: DVector::zeros(dim),
            precision: DMatrix::identity(dim, dim) * precision,
        }
    }
}

/// MAP coefficients and log marginal likelihood of one basis choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceResult {
    pub powers: Vec<Power>,
    pub a_map: DVector<f64>,
    pub log_evidence: f64,
    pub posterior_covariance: DMatrix<f64>,
}
