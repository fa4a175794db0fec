//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - observation input records (`ObservationRow`, `DataType`)
//! - redshift model selection and parameters (`SegMode`, `DeltaMParams`, `RedshiftConfig`)
//! - per-row outputs (`PredictionRow`)
//! - shell chain inputs/outputs for segwave propagation (`ShellRow`, `ChainRow`)

pub mod types;

pub use types::*;
