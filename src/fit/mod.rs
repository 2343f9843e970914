//! Model identification.
//!
//! Responsibilities:
//!
//! - sparse regression over a candidate basis (`stlsq`, `stlsq_odr`)
//! - the threshold-and-refit round both sparsifiers share (`sparsify`)
//! - Bayesian evidence for a fixed polynomial basis (`evidence`)
//! - ranking candidate bases by evidence (`selection`)

pub mod evidence;
pub mod selection;
pub mod sparsify;
pub mod stlsq;
pub mod stlsq_odr;

pub use evidence::*;
pub use selection::*;
pub use stlsq::*;
pub use stlsq_odr::*;
