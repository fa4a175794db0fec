//! Sequential step runner.
//!
//! Order of a run:
//! 1) run-root guard (nothing is written when it fails)
//! 2) config load, run directories, run log
//! 3) changed-files sidecar
//! 4) enabled steps in config order, each isolated from the others' failures
//! 5) manifest, then summary

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{Local, Utc};

use crate::error::{AppError, EXIT_INVALID, StepExecutionError};
use crate::io::write_json;
use crate::suite::artifacts::{Artifact, OutputScope, collect_artifacts};
use crate::suite::changed_files::snapshot;
use crate::suite::config::load_config;
use crate::suite::interrupt::InterruptFlag;
use crate::suite::logging::install_run_logging;
use crate::suite::manifest::{
    CHANGED_FILES_PATH, ChangedFilesRef, StepResult, SuiteManifest, timestamp, write_manifest,
};
use crate::suite::steps::{StepContext, lookup};
use crate::suite::summary::write_summary;

pub const EXIT_STEP_FAILED: u8 = 1;
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone)]
pub struct SuiteOptions {
    pub config: PathBuf,
    pub root: PathBuf,
    /// Required ending of the root directory name; empty accepts any.
    pub root_suffix: String,
    pub log_level: String,
    pub interrupt: InterruptFlag,
}

impl SuiteOptions {
    pub fn new(config: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            config: config.into(),
            root: root.into(),
            root_suffix: String::new(),
            log_level: "info".to_string(),
            interrupt: InterruptFlag::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    pub manifest: SuiteManifest,
    pub manifest_path: PathBuf,
    pub summary_path: PathBuf,
}

impl SuiteOutcome {
    /// 130 when interrupted, 1 if any step failed, else 0.
    pub fn exit_code(&self) -> u8 {
        if self.manifest.interrupted {
            EXIT_INTERRUPTED
        } else if self.manifest.fail_count() > 0 {
            EXIT_STEP_FAILED
        } else {
            0
        }
    }
}

/// The root must exist and its directory name must end with `suffix`.
pub fn check_run_root(root: &Path, suffix: &str) -> Result<PathBuf, AppError> {
    let root = root.canonicalize().map_err(|e| {
        AppError::new(EXIT_INVALID, format!("Run root '{}' is not accessible: {e}", root.display()))
    })?;
    if suffix.is_empty() {
        return Ok(root);
    }
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !name.ends_with(suffix) {
        return Err(AppError::new(
            EXIT_INVALID,
            format!("Run root '{}' does not end with '{suffix}'; refusing to run", root.display()),
        ));
    }
    Ok(root)
}

/// Run every enabled step and write the manifest and summary.
///
/// Errors are fatal setup problems only; step failures are in the outcome.
pub fn run_suite(options: &SuiteOptions) -> Result<SuiteOutcome, AppError> {
    let root = check_run_root(&options.root, &options.root_suffix)?;
    let config = load_config(&options.config)?;
    let scope = OutputScope::new(&root);

    let started_at = Utc::now();
    let clock = Instant::now();

    std::fs::create_dir_all(scope.resolve(format!("reports/{}/suite_plots", config.run_id))?)
        .map_err(|e| AppError::new(EXIT_STEP_FAILED, format!("Failed to create run directory: {e}")))?;
    let log_rel = format!(
        "reports/{id}/logs/suite_{id}_{stamp}.log",
        id = config.run_id,
        stamp = Local::now().format("%Y%m%d_%H%M%S")
    );
    let log_path = scope.resolve(&log_rel)?;
    let _log_guard = install_run_logging(&log_path, &options.log_level)
        .map_err(|e| AppError::new(EXIT_STEP_FAILED, format!("Failed to open suite log: {e}")))?;

    tracing::info!(run_id = %config.run_id, mode = config.mode.as_str(), root = %root.display(), "suite started");
    config.warn_unknown_keys();

    let changed = snapshot(&root, config.time_window_days, started_at);
    write_json(&root.join(CHANGED_FILES_PATH), &changed)?;
    tracing::info!(count = changed.count, "changed files recorded");

    let ctx = StepContext {
        root: &root,
        run_id: &config.run_id,
        mode: config.mode,
        config: &config,
        seed: config.seed,
        scope,
        interrupt: &options.interrupt,
    };

    let mut steps = Vec::new();
    let mut artifacts: Vec<Artifact> = Vec::new();
    let mut interrupted = false;
    for entry in config.enabled_steps() {
        if options.interrupt.is_raised() {
            interrupted = true;
            break;
        }
        let (result, registered) = run_step(&ctx, &entry.name);
        artifacts.extend(registered);
        steps.push(result);
        if options.interrupt.is_raised() {
            tracing::warn!(after = %entry.name, "interrupt received; not starting further steps");
            interrupted = true;
            break;
        }
    }

    let manifest = SuiteManifest {
        run_id: config.run_id.clone(),
        mode: config.mode.as_str().to_string(),
        started: timestamp(started_at),
        finished: timestamp(Utc::now()),
        duration_s: clock.elapsed().as_secs_f64(),
        log: log_rel,
        interrupted,
        steps,
        changed_files: ChangedFilesRef {
            path: CHANGED_FILES_PATH.to_string(),
            snapshot: changed,
        },
        artifacts,
    };
    let manifest_path = write_manifest(&root, &manifest)?;
    let summary_path = write_summary(&root, &manifest)?;
    tracing::info!(
        ok = manifest.ok_count(),
        fail = manifest.fail_count(),
        manifest = %manifest_path.display(),
        "suite finished"
    );

    Ok(SuiteOutcome {
        manifest,
        manifest_path,
        summary_path,
    })
}

/// Execute one step by name; never lets a failure escape.
fn run_step(ctx: &StepContext<'_>, name: &str) -> (StepResult, Vec<Artifact>) {
    let t_start = Utc::now();
    let clock = Instant::now();
    tracing::info!(step = name, "step started");

    let Some(step) = lookup(name) else {
        tracing::warn!(step = name, "unknown step; skipped");
        let result = StepResult {
            name: name.to_string(),
            t_start: timestamp(t_start),
            t_end: timestamp(Utc::now()),
            dt_s: clock.elapsed().as_secs_f64(),
            ok: false,
            skipped: true,
            error: Some(format!("unknown step '{name}'; skipped")),
            artifacts: Default::default(),
        };
        return (result, Vec::new());
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| step(ctx))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(StepExecutionError::new(format!("panic: {message}")))
    });

    let (ok, error, map) = match outcome {
        Ok(map) => (true, None, map),
        Err(err) => {
            tracing::error!(step = name, error = %err.message, "step failed");
            (false, Some(err.message), err.artifacts)
        }
    };
    let registered = collect_artifacts(&ctx.scope, name, &map);
    let dt_s = clock.elapsed().as_secs_f64();
    tracing::info!(step = name, ok, dt_s, artifacts = registered.len(), "step finished");

    let result = StepResult {
        name: name.to_string(),
        t_start: timestamp(t_start),
        t_end: timestamp(Utc::now()),
        dt_s,
        ok,
        skipped: false,
        error,
        artifacts: map,
    };
    (result, registered)
}
