//! Polynomial model evaluation.
//!
//! Models are implemented as small, pure functions so that fitting code and
//! callers checking an identified model against data can share them.

pub mod model;

pub use model::*;
