//! Input/output helpers.
//!
//! - observation CSV ingest + validation (`ingest`)
//! - shell CSV ingest (`shells`)
//! - result exports (CSV/JSON/text) (`export`)

pub mod export;
pub mod ingest;
pub mod shells;

pub use export::*;
pub use ingest::*;
pub use shells::*;
