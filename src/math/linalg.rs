//! Dense helpers on top of nalgebra: checked inverses and sign/log-determinants.

use nalgebra::{DMatrix, DVector, Dyn, LU};

use crate::error::{IdentError, Result};

/// Invert a precision or covariance matrix.
///
/// A matrix with no inverse cannot be turned into a covariance, so failure is
/// reported as `NonPositiveDefiniteCovariance` naming `matrix`.
pub fn invert_covariance(m: &DMatrix<f64>, matrix: &'static str) -> Result<DMatrix<f64>> {
    if !m.is_square() {
        return Err(IdentError::invalid(format!(
            "{matrix} must be square, got {}x{}",
            m.nrows(),
            m.ncols()
        )));
    }
    match m.clone().try_inverse() {
        Some(inv) if inv.iter().all(|v| v.is_finite()) => Ok(inv),
        _ => Err(IdentError::NonPositiveDefiniteCovariance { matrix }),
    }
}

/// LU factorization that reports its determinant as `(sign, ln|det|)`.
///
/// Working in the log domain keeps the determinant of large covariance matrices
/// (one row per sample) from overflowing or underflowing.
pub struct LuFactor {
    lu: LU<f64, Dyn, Dyn>,
}

impl LuFactor {
    pub fn new(m: DMatrix<f64>) -> Result<Self> {
        if !m.is_square() {
            return Err(IdentError::invalid(format!(
                "LU factorization needs a square matrix, got {}x{}",
                m.nrows(),
                m.ncols()
            )));
        }
        Ok(Self { lu: m.lu() })
    }

    /// Sign and log-magnitude of the determinant.
    ///
    /// A singular matrix has sign `0.0` and log-magnitude `-inf`.
    pub fn sign_log_det(&self) -> (f64, f64) {
        let mut sign: f64 = self.lu.p().determinant();
        let mut log_abs = 0.0;
        for d in self.lu.u().diagonal().iter() {
            if *d == 0.0 || !d.is_finite() {
                return (0.0, f64::NEG_INFINITY);
            }
            if *d < 0.0 {
                sign = -sign;
            }
            log_abs += d.abs().ln();
        }
        (sign, log_abs)
    }

    pub fn solve(&self, b: &DVector<f64>) -> Option<DVector<f64>> {
        self.lu.solve(b)
    }
}
