//! Suite orchestrator.
//!
//! - `config`: YAML run configuration
//! - `steps`: registry of named steps and their implementations
//! - `runner`: run-root guard, sequential execution, manifest + summary emission
//! - `artifacts`: write-scope guard, SHA-256 registration, integrity checks
//! - `changed_files`: recent-modification snapshot of the working tree
//! - `subprocess`: child processes with timeout and UTF-8 capture
//! - `junit`: JUnit XML totals
//! - `logging`: stderr and rotating-file tracing setup
//! - `interrupt`: Ctrl-C flag
//! - `manifest` / `summary`: run outputs

pub mod artifacts;
pub mod changed_files;
pub mod config;
pub mod interrupt;
pub mod junit;
pub mod logging;
pub mod manifest;
pub mod runner;
pub mod steps;
pub mod subprocess;
pub mod summary;

pub use artifacts::{Artifact, Mismatch, OutputScope, read_manifest_artifacts, verify_artifacts};
pub use config::{SuiteConfig, SuiteMode, load_config};
pub use interrupt::InterruptFlag;
pub use manifest::{MANIFEST_PATH, StepResult, SuiteManifest};
pub use runner::{EXIT_INTERRUPTED, EXIT_STEP_FAILED, SuiteOptions, SuiteOutcome, check_run_root, run_suite};
