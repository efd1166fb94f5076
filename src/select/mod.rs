//! Granger-based variable selection.

pub mod exog;
pub mod grangers;

pub use exog::*;
pub use grangers::*;
