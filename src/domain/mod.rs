//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - option structs with named defaults (`StlsqOptions`, `StlsqOdrOptions`, `OdrSettings`)
//! - measurement uncertainty inputs (`Uncertainty`)
//! - the explicit active basis set carried alongside coefficient sub-vectors (`ActiveSet`)
//! - fit outputs (`SparseFit`, `SparseOdrFit`, `EvidenceResult`)

pub mod types;

pub use types::*;
