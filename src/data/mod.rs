//! Seeded synthetic data for exercising the identification routines.

pub mod sample;

pub use sample::*;
