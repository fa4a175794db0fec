//! Closed-form relativistic formulas and the SI constants they use.
//!
//! Everything here is a pure function of its arguments. Degenerate inputs
//! (non-positive mass, radius inside the horizon, missing velocity) yield
//! `NaN` rather than an error so callers can drop a single model per row.

pub mod constants;
pub mod relativity;

pub use constants::*;
pub use relativity::*;
