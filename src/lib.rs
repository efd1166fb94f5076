//! `taxbase-forecast` library crate.
//!
//! The binary (`tbf`) is a thin wrapper around this library so that:
//!
//! - the selection/fitting engine is testable without spawning processes
//! - the pipeline stages (guide, transforms, Granger selection, VAR search,
//!   fiscal-year aggregation) are reusable on their own
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod report;
pub mod select;
pub mod stats;
pub mod transform;
