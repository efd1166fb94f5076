//! Model fitting and search.
//!
//! Responsibilities:
//!
//! - estimate and forecast one VAR(X) candidate (`var`)
//! - score it out of sample with rolling origins (`walk_forward`)
//! - enumerate and rank candidates in parallel (`grid`)
//! - average the best candidates by fiscal year (`aggregate`)

pub mod aggregate;
pub mod grid;
pub mod var;
pub mod walk_forward;

pub use aggregate::*;
pub use grid::*;
pub use var::*;
pub use walk_forward::*;
