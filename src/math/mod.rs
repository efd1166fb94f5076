//! Mathematical utilities: least squares and lag matrices.

pub mod lags;
pub mod ols;

pub use lags::*;
pub use ols::*;
