//! Numeric utilities: order statistics, exact tests, bootstrap, and a bounded
//! scalar minimiser.

pub mod optimize;
pub mod stats;

pub use optimize::*;
pub use stats::*;
