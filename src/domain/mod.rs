//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - calendar quarters and fiscal-year mapping (`Quarter`)
//! - the quarterly feature table (`FeatureTable`)
//! - guide entries, fit candidates/results, forecasts and run config

pub mod quarter;
pub mod table;
pub mod types;

pub use quarter::*;
pub use table::*;
pub use types::*;
