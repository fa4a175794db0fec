//! Command-line parsing for the two binaries.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipelines: the structs here are converted into plain config values in `app`.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::segwave::DEFAULT_ALPHA_BOUNDS;

/// Suite orchestrator CLI.
#[derive(Debug, Parser)]
#[command(name = "ssz-suite", version, about = "Run the SSZ evaluation suite and write a manifest")]
pub struct SuiteCli {
    /// Suite YAML configuration.
    #[arg(long, required_unless_present = "verify")]
    pub config: Option<PathBuf>,

    /// Repository root (the run-root). Defaults to the current directory.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Required suffix of the run-root directory name (empty accepts any).
    ///
    /// Falls back to `SSZ_ROOT_SUFFIX`.
    #[arg(long)]
    pub root_suffix: Option<String>,

    /// Recompute the digests recorded in a manifest instead of running steps.
    #[arg(long, value_name = "MANIFEST")]
    pub verify: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Errors only.
    #[arg(short, long)]
    pub quiet: bool,
}

impl SuiteCli {
    /// Default log level implied by `-v`/`-q`.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

/// Segwave (ring temperature) CLI.
#[derive(Debug, Parser)]
#[command(
    name = "ssz-rings",
    version,
    about = "Propagate a velocity field through ring shells (segmented radio-wave model)"
)]
#[command(group(ArgGroup::new("alpha_mode").required(true).args(["alpha", "fit_alpha"])))]
pub struct RingsCli {
    /// Shell CSV with `ring, T` and optional `n, v_obs`.
    #[arg(long)]
    pub csv: PathBuf,

    /// Initial velocity v_1 in km/s.
    #[arg(long)]
    pub v0: f64,

    /// Fixed segwave exponent α.
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Fit α against `v_obs` instead of fixing it.
    #[arg(long)]
    pub fit_alpha: bool,

    /// Lower α bound for the fit.
    #[arg(long, default_value_t = DEFAULT_ALPHA_BOUNDS.0)]
    pub alpha_min: f64,

    /// Upper α bound for the fit.
    #[arg(long, default_value_t = DEFAULT_ALPHA_BOUNDS.1)]
    pub alpha_max: f64,

    /// Temperature exponent β.
    #[arg(long, default_value_t = 1.0)]
    pub beta: f64,

    /// Density exponent η (0 disables the density factor).
    #[arg(long, default_value_t = 0.0)]
    pub eta: f64,

    /// Input frequency in Hz; adds the frequency track.
    #[arg(long)]
    pub nu_in: Option<f64>,

    /// Write the prediction table (CSV).
    #[arg(long)]
    pub out_table: Option<PathBuf>,

    /// Write the text report.
    #[arg(long)]
    pub out_report: Option<PathBuf>,

    /// Write an α-grid RMSE scan (CSV); needs `v_obs`.
    #[arg(long)]
    pub out_grid: Option<PathBuf>,
}
