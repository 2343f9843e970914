//! Numerical building blocks: polynomial bases, least squares, dense linear
//! algebra helpers and orthogonal distance regression.

pub mod basis;
pub mod linalg;
pub mod odr;
pub mod ols;

pub use basis::*;
pub use linalg::*;
pub use odr::*;
pub use ols::*;
