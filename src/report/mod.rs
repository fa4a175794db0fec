//! Reporting utilities: formatted terminal/text output for both pipelines.

pub mod format;

pub use format::*;
