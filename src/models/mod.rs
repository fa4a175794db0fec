//! Row-level model logic layered on top of `physics`.
//!
//! - `velocity`: category-driven velocity imputation
//! - `delta_m`: the mass-dependent Δ(M) correction and its normalisation
//! - `seg`: total dispatch over `SegMode` producing `z_SEG`

pub mod delta_m;
pub mod seg;
pub mod velocity;

pub use delta_m::*;
pub use seg::*;
pub use velocity::*;
