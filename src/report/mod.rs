//! Reporting: formatted terminal output for guides, Granger matrices,
//! rankings and fiscal-year forecasts.

pub mod format;

pub use format::*;
