//! Segmented radio-wave propagation.
//!
//! - `propagation`: q-factors, velocity recursion, cumulative gamma, frequency track, residuals
//! - `calib`: bounded α fit and α grid scan

pub mod calib;
pub mod propagation;

pub use calib::*;
pub use propagation::*;
