//! `sparse-ident` library crate.
//!
//! Identifies polynomial dynamics `dx/dt = f(x)` from sampled data:
//!
//! - `fit::stlsq` sparsifies a least-squares fit over a caller-supplied library
//! - `fit::stlsq_odr` does the same for a polynomial basis with noise in both `x`
//!   and `dx/dt`, thresholding in an L2-normalized basis
//! - `fit::evidence` scores a fixed power set by Bayesian marginal likelihood,
//!   and `fit::selection` ranks several
//!
//! The crate installs no logger. Diagnostics go through the `log` facade.

pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod math;
pub mod models;
pub mod report;

pub use error::{IdentError, Result};
