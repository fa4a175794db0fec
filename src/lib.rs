//! `ssz-suite` library crate.
//!
//! The binaries (`ssz-suite`, `ssz-rings`) are thin wrappers around this
//! library so that:
//!
//! - core logic is testable without spawning processes
//! - the redshift and segwave cores stay usable without the orchestrator
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod physics;
pub mod redshift;
pub mod report;
pub mod segwave;
pub mod suite;
