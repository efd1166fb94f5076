//! Built-in datasets.

pub mod sample;

pub use sample::*;
