//! Input/output helpers.
//!
//! - CSV ingest into feature tables (`ingest`)
//! - forecast/fit exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
