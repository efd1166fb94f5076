//! Statistical tests and metrics.
//!
//! - ADF unit-root test (`adf`) used to build the stationarity guide
//! - Granger-causality tests (`granger`) used for regressor selection
//! - MAPE and correlations (`metrics`)

pub mod adf;
pub mod granger;
pub mod metrics;

pub use adf::*;
pub use granger::*;
pub use metrics::*;
