//! Plain-text reporting of identified models and evidence rankings.

pub mod format;

pub use format::*;
