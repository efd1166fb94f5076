//! Stationarity transforms.
//!
//! - `guide`: decide log/norm and differencing per column
//! - `pipeline`: apply and invert those decisions
//! - `prep`: raw-table cleanup before either

pub mod guide;
pub mod pipeline;
pub mod prep;

pub use guide::*;
pub use pipeline::*;
pub use prep::*;
