//! Redshift evaluation pipeline.
//!
//! - `evaluate`: observed-z selection, effective radius, velocity imputation, four-model predictions
//! - `aggregate`: medians/means, bootstrap CIs, paired sign test, mass bins, outliers
//! - `mass`: canonical mass round-trip and bound-energy constants

pub mod aggregate;
pub mod evaluate;
pub mod mass;

pub use aggregate::*;
pub use evaluate::*;
pub use mass::*;

use std::path::Path;

use crate::domain::RedshiftConfig;
use crate::error::ValidationError;
use crate::io::{ObservationTable, load_observations};

/// Everything produced by one redshift run.
#[derive(Debug, Clone)]
pub struct RedshiftRun {
    pub table: ObservationTable,
    pub evaluation: Evaluation,
    pub summary: RedshiftSummary,
}

/// Load, evaluate and summarise an observation CSV.
pub fn run_redshift(csv: &Path, config: &RedshiftConfig) -> Result<RedshiftRun, ValidationError> {
    let table = load_observations(csv)?;
    tracing::info!(path = %csv.display(), rows = table.rows_read, mode = config.mode.label(), "evaluating redshift table");

    let evaluation = evaluate_rows(&table.rows, config);
    let summary = summarize(&evaluation, config);
    tracing::info!(
        usable = summary.rows_usable,
        pairs = summary.paired.n,
        wins = summary.paired.wins,
        p = summary.paired.p_two_sided,
        "redshift evaluation complete"
    );

    Ok(RedshiftRun {
        table,
        evaluation,
        summary,
    })
}
