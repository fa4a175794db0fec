//! Top-level application orchestration.
//!
//! Both binaries are intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads `.env` overrides
//! - runs the suite (or verifies a manifest) / runs the rings pipeline
//! - prints reports and writes optional exports

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{RingsCli, SuiteCli};
use crate::error::{AppError, EXIT_INVALID};
use crate::suite::logging::init_stderr;
use crate::suite::{InterruptFlag, SuiteOptions, read_manifest_artifacts, verify_artifacts};

pub mod pipeline;

use pipeline::{AlphaChoice, RingsConfig};

/// Variable consulted when `--root-suffix` is not given.
pub const ROOT_SUFFIX_ENV: &str = "SSZ_ROOT_SUFFIX";

/// Entry point for the `ssz-suite` binary.
pub fn run_suite() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = SuiteCli::parse();

    match &cli.verify {
        Some(manifest) => handle_verify(&cli, manifest),
        None => handle_suite(&cli),
    }
}

/// Entry point for the `ssz-rings` binary.
pub fn run_rings() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = RingsCli::parse();
    init_stderr("warn");
    handle_rings(&cli)
}

fn handle_suite(cli: &SuiteCli) -> Result<(), AppError> {
    let options = suite_options_from_cli(cli)?;
    options.interrupt.watch_ctrl_c();

    let outcome = crate::suite::run_suite(&options)?;
    let m = &outcome.manifest;
    println!(
        "Suite complete in {:.2}s -> OK: {}, Fail: {}",
        m.duration_s,
        m.ok_count(),
        m.fail_count()
    );

    match outcome.exit_code() {
        0 => Ok(()),
        code if m.interrupted => Err(AppError::new(code, "Interrupted; manifest written for completed steps")),
        code => Err(AppError::new(
            code,
            format!("{} step(s) failed; see {}", m.fail_count(), outcome.manifest_path.display()),
        )),
    }
}

pub fn suite_options_from_cli(cli: &SuiteCli) -> Result<SuiteOptions, AppError> {
    let config = cli
        .config
        .clone()
        .ok_or_else(|| AppError::new(EXIT_INVALID, "--config is required"))?;
    let root_suffix = cli
        .root_suffix
        .clone()
        .or_else(|| std::env::var(ROOT_SUFFIX_ENV).ok())
        .unwrap_or_default();

    Ok(SuiteOptions {
        config,
        root: suite_root(cli),
        root_suffix,
        log_level: cli.log_level().to_string(),
        interrupt: InterruptFlag::new(),
    })
}

fn suite_root(cli: &SuiteCli) -> PathBuf {
    cli.root.clone().unwrap_or_else(|| PathBuf::from("."))
}

fn handle_verify(cli: &SuiteCli, manifest: &Path) -> Result<(), AppError> {
    init_stderr(cli.log_level());
    let root = suite_root(cli);
    let artifacts = read_manifest_artifacts(manifest)?;
    let mismatches = verify_artifacts(&root, &artifacts);

    for m in &mismatches {
        match &m.actual {
            Some(actual) => println!("MISMATCH {}: expected {}, found {actual}", m.path, m.expected),
            None => println!("MISSING  {}: expected {}", m.path, m.expected),
        }
    }
    if mismatches.is_empty() {
        println!("OK: {} artifact(s) verified", artifacts.len());
        Ok(())
    } else {
        Err(AppError::new(
            1,
            format!("{} of {} artifact(s) failed verification", mismatches.len(), artifacts.len()),
        ))
    }
}

fn handle_rings(cli: &RingsCli) -> Result<(), AppError> {
    let config = rings_config_from_args(cli);
    let run = pipeline::run_rings(&config)?;

    let report = crate::report::format_rings_report(&run);
    println!("{report}");

    // Optional exports.
    if let Some(path) = &cli.out_table {
        crate::io::write_chain_csv(path, &run.chain, run.table.has_n, run.metrics.is_some())?;
    }
    if let Some(path) = &cli.out_report {
        crate::io::write_text(path, &report)?;
    }
    if let Some(path) = &cli.out_grid {
        let grid = run
            .grid
            .as_ref()
            .ok_or_else(|| AppError::new(EXIT_INVALID, "--out-grid needs a v_obs value for every shell"))?;
        crate::io::write_alpha_grid_csv(path, grid)?;
    }

    Ok(())
}

pub fn rings_config_from_args(cli: &RingsCli) -> RingsConfig {
    let alpha = match cli.alpha {
        Some(alpha) => AlphaChoice::Fixed(alpha),
        None => AlphaChoice::Fit {
            lo: cli.alpha_min,
            hi: cli.alpha_max,
        },
    };
    RingsConfig {
        csv: cli.csv.clone(),
        v0: cli.v0,
        alpha,
        beta: cli.beta,
        eta: cli.eta,
        nu_in: cli.nu_in,
        grid: cli.out_grid.is_some(),
    }
}
