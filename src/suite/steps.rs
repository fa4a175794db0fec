//! Step registry and the built-in steps.
//!
//! A step receives an immutable `StepContext` and returns a map describing
//! its artifacts. Paths in the map are repository-relative strings; the
//! runner hashes whichever of them exist once the step has returned.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::app::pipeline::{AlphaChoice, RingsConfig, run_rings};
use crate::domain::ArtifactMap;
use crate::error::{AppError, StepExecutionError};
use crate::io::{write_chain_csv, write_debug_csv, write_json, write_mass_validation_csv, write_text};
use crate::redshift::{bound_energy, format_bound_energy, run_redshift, validate_masses};
use crate::report::{format_redshift_report, format_rings_report};
use crate::suite::artifacts::OutputScope;
use crate::suite::config::{SuiteConfig, SuiteMode};
use crate::suite::interrupt::InterruptFlag;
use crate::suite::junit::parse_junit;
use crate::suite::subprocess::{CommandSpec, run_command, write_spawn_failure, write_transcript};

/// SEG may exceed the GR×SR median by at most this factor when `junit_check` is on.
pub const SEG_MEDIAN_GATE: f64 = 1.2;

/// Extra argument appended to the tests command in fast mode.
pub const FAST_FILTER_ENV: &str = "SSZ_TESTS_FAST_FILTER";

pub type StepFn = fn(&StepContext<'_>) -> Result<ArtifactMap, StepExecutionError>;

/// Name → step, in documentation order.
pub const REGISTRY: [(&str, StepFn); 5] = [
    ("redshift_eval", redshift_eval),
    ("mass_validation", mass_validation),
    ("bound_energy", bound_energy_step),
    ("ring_temperature_analysis", ring_temperature_analysis),
    ("tests", tests_step),
];

pub fn lookup(name: &str) -> Option<StepFn> {
    REGISTRY.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

/// Read-only view of the run handed to every step.
#[derive(Debug, Clone)]
pub struct StepContext<'a> {
    pub root: &'a Path,
    pub run_id: &'a str,
    pub mode: SuiteMode,
    pub config: &'a SuiteConfig,
    pub seed: u64,
    pub scope: OutputScope,
    pub interrupt: &'a InterruptFlag,
}

impl StepContext<'_> {
    /// `reports/<run_id>/<name>`
    pub fn run_path(&self, name: &str) -> String {
        format!("reports/{}/{name}", self.run_id)
    }

    /// Input paths in the config are relative to the root unless absolute.
    pub fn input_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn skipped() -> ArtifactMap {
    let mut map = ArtifactMap::new();
    map.insert("status".to_string(), Value::from("skipped"));
    map
}

/// Write one artifact through the scope and record it under `key`.
///
/// On failure the error carries everything recorded so far.
fn emit(
    ctx: &StepContext<'_>,
    artifacts: &mut ArtifactMap,
    key: &str,
    rel: &str,
    write: impl FnOnce(&Path) -> Result<(), AppError>,
) -> Result<(), StepExecutionError> {
    let partial = |message: String, artifacts: &ArtifactMap| StepExecutionError::with_artifacts(message, artifacts.clone());
    let path = ctx.scope.prepare(rel).map_err(|e| partial(e.message, artifacts))?;
    write(&path).map_err(|e| partial(e.message().to_string(), artifacts))?;
    artifacts.insert(key.to_string(), Value::from(rel));
    Ok(())
}

fn redshift_eval(ctx: &StepContext<'_>) -> Result<ArtifactMap, StepExecutionError> {
    let Some(csv) = &ctx.config.redshift_csv else {
        tracing::info!("redshift_csv not configured; skipping");
        return Ok(skipped());
    };
    let config = ctx.config.redshift_config();
    let run = run_redshift(&ctx.input_path(csv), &config)?;
    let s = &run.summary;

    let mut artifacts = ArtifactMap::new();
    let debug_rel = "agent_out/reports/redshift_debug.csv";
    emit(ctx, &mut artifacts, "debug_csv", debug_rel, |p| {
        write_debug_csv(p, &run.evaluation.rows, &run.table.extra_columns)
    })?;
    emit(ctx, &mut artifacts, "medians", "agent_out/reports/redshift_medians.json", |p| {
        write_json(p, &s.medians)
    })?;
    emit(ctx, &mut artifacts, "means", "agent_out/reports/redshift_means.json", |p| {
        write_json(p, &s.means)
    })?;
    emit(ctx, &mut artifacts, "paired_stats", "agent_out/reports/redshift_paired_stats.json", |p| {
        write_json(p, &s.paired)
    })?;
    emit(ctx, &mut artifacts, "cis", "agent_out/reports/redshift_cis.json", |p| write_json(p, &s.cis))?;
    emit(ctx, &mut artifacts, "outliers", "agent_out/reports/redshift_outliers.json", |p| {
        write_json(p, &s.outliers)
    })?;
    emit(ctx, &mut artifacts, "mass_bins", "agent_out/reports/redshift_mass_bins.json", |p| {
        write_json(p, &s.mass_bins)
    })?;
    emit(ctx, &mut artifacts, "report", "agent_out/reports/redshift_report.txt", |p| {
        write_text(p, &format_redshift_report(s, &config, debug_rel))
    })?;
    artifacts.insert("rows_usable".to_string(), Value::from(s.rows_usable));
    artifacts.insert("n_pairs".to_string(), Value::from(s.paired.n));

    if ctx.config.junit_check
        && let Some(ratio) = s.seg_to_grsr_ratio()
        && ratio > SEG_MEDIAN_GATE
    {
        tracing::error!(ratio, "SEG median gate failed");
        return Err(StepExecutionError::with_artifacts(
            "seg median exceeds 1.2 x grsr median",
            artifacts,
        ));
    }
    Ok(artifacts)
}

fn mass_validation(ctx: &StepContext<'_>) -> Result<ArtifactMap, StepExecutionError> {
    let rows = validate_masses(&ctx.config.delta_m())?;
    for r in &rows {
        tracing::debug!(label = %r.label, rel = r.rel, "mass round-trip");
    }
    let mut artifacts = ArtifactMap::new();
    emit(ctx, &mut artifacts, "csv", "agent_out/reports/mass_validation.csv", |p| {
        write_mass_validation_csv(p, &rows)
    })?;
    Ok(artifacts)
}

fn bound_energy_step(ctx: &StepContext<'_>) -> Result<ArtifactMap, StepExecutionError> {
    let text = format_bound_energy(&bound_energy());
    let mut artifacts = ArtifactMap::new();
    emit(ctx, &mut artifacts, "report", "agent_out/reports/bound_energy.txt", |p| write_text(p, &text))?;
    Ok(artifacts)
}

fn ring_temperature_analysis(ctx: &StepContext<'_>) -> Result<ArtifactMap, StepExecutionError> {
    let Some(csv) = &ctx.config.rings_csv else {
        tracing::info!("rings_csv not configured; skipping");
        return Ok(skipped());
    };
    let config = RingsConfig {
        csv: ctx.input_path(csv),
        v0: ctx.config.rings_v0,
        alpha: ctx.config.rings_alpha.map(AlphaChoice::Fixed).unwrap_or_default(),
        beta: ctx.config.rings_beta,
        eta: ctx.config.rings_eta,
        nu_in: ctx.config.rings_nu_in,
        grid: false,
    };
    let run = run_rings(&config)?;

    let mut artifacts = ArtifactMap::new();
    emit(
        ctx,
        &mut artifacts,
        "predictions",
        &ctx.run_path("ring_temperature_predictions.csv"),
        |p| write_chain_csv(p, &run.chain, run.table.has_n, run.metrics.is_some()),
    )?;
    emit(
        ctx,
        &mut artifacts,
        "report",
        &ctx.run_path("ring_temperature_analysis.txt"),
        |p| write_text(p, &format_rings_report(&run)),
    )?;
    artifacts.insert("alpha".to_string(), Value::from(run.params.alpha));
    Ok(artifacts)
}

fn tests_step(ctx: &StepContext<'_>) -> Result<ArtifactMap, StepExecutionError> {
    let Some(argv) = &ctx.config.tests_command else {
        tracing::info!("tests_command not configured; skipping");
        return Ok(skipped());
    };

    let junit_rel = ctx.run_path("pytest_results.xml");
    let junit_path = ctx.scope.prepare(&junit_rel)?;
    let log_rel = ctx.run_path("logs/tests.log");
    let log_path = ctx.scope.prepare(&log_rel)?;
    let root = std::path::absolute(ctx.root)?;

    let junit_arg = junit_path.display().to_string();
    let root_arg = root.display().to_string();
    let mut argv: Vec<String> = argv
        .iter()
        .map(|a| a.replace("{junit}", &junit_arg).replace("{root}", &root_arg))
        .collect();
    if ctx.mode == SuiteMode::Fast
        && let Ok(filter) = std::env::var(FAST_FILTER_ENV)
        && !filter.trim().is_empty()
    {
        argv.push(filter);
    }

    let spec = CommandSpec::from_argv(&argv, &root, ctx.config.tests_timeout())
        .ok_or_else(|| StepExecutionError::new("tests_command is empty"))?;
    let mut artifacts = ArtifactMap::new();
    let output = match run_command(&spec, Some(ctx.interrupt.as_atomic())) {
        Ok(output) => output,
        Err(e) => {
            write_spawn_failure(&log_path, &spec, &e)?;
            artifacts.insert("log".to_string(), Value::from(log_rel));
            return Err(StepExecutionError::with_artifacts(
                format!("tests failed: cannot start '{}': {e}", spec.program),
                artifacts,
            ));
        }
    };

    write_transcript(&log_path, &spec, &output)?;
    artifacts.insert("log".to_string(), Value::from(log_rel));

    if junit_path.is_file() {
        artifacts.insert("junit".to_string(), Value::from(junit_rel));
        if let Some(summary) = parse_junit(&junit_path) {
            emit(ctx, &mut artifacts, "summary", &ctx.run_path("pytest_summary.json"), |p| {
                write_json(p, &summary)
            })?;
        }
    }

    match output.failure_reason() {
        Some(reason) => Err(StepExecutionError::with_artifacts(format!("tests failed: {reason}"), artifacts)),
        None => Ok(artifacts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::config::parse_config_str;

    const OBSERVATIONS: &str = "case,category,M_solar,a_m,e,z,z_geom_hint,v_tot_mps,data_type\n\
S2,S-stars,4.15e6,1.5e14,0.88,0.0003,0.0002,7.0e6,emission_line\n\
S29,S-stars,4.15e6,2.0e14,0.97,0.00025,,6.5e6,emission_line\n\
G1,gas,4.15e6,,,0.0001,,1.0e5,continuum\n";

    struct Fixture {
        dir: tempfile::TempDir,
        config: SuiteConfig,
        flag: InterruptFlag,
    }

    impl Fixture {
        fn new(yaml: &str) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                config: parse_config_str(yaml).unwrap(),
                flag: InterruptFlag::new(),
            }
        }

        fn ctx(&self) -> StepContext<'_> {
            StepContext {
                root: self.dir.path(),
                run_id: &self.config.run_id,
                mode: self.config.mode,
                config: &self.config,
                seed: self.config.seed,
                scope: OutputScope::new(self.dir.path()),
                interrupt: &self.flag,
            }
        }
    }

    #[test]
    fn every_registered_name_resolves() {
        for (name, _) in REGISTRY {
            assert!(lookup(name).is_some());
        }
        assert!(lookup("plots").is_none());
    }

    #[test]
    fn redshift_step_writes_reports() {
        let fx = Fixture::new("run_id: r1\nredshift_csv: obs.csv\nbootstrap_samples: 50\n");
        std::fs::write(fx.dir.path().join("obs.csv"), OBSERVATIONS).unwrap();
        let artifacts = redshift_eval(&fx.ctx()).unwrap();
        for key in ["debug_csv", "medians", "paired_stats", "cis", "report"] {
            let rel = artifacts[key].as_str().unwrap();
            assert!(rel.starts_with("agent_out/reports/"));
            assert!(fx.dir.path().join(rel).is_file(), "{rel}");
        }
        assert_eq!(artifacts["rows_usable"], Value::from(3));
    }

    #[test]
    fn missing_inputs_skip() {
        let fx = Fixture::new("run_id: r1\n");
        assert_eq!(redshift_eval(&fx.ctx()).unwrap(), skipped());
        assert_eq!(ring_temperature_analysis(&fx.ctx()).unwrap(), skipped());
        assert_eq!(tests_step(&fx.ctx()).unwrap(), skipped());
    }

    #[test]
    fn mass_and_energy_steps() {
        let fx = Fixture::new("run_id: r1\n");
        let mass = mass_validation(&fx.ctx()).unwrap();
        let csv = std::fs::read_to_string(fx.dir.path().join(mass["csv"].as_str().unwrap())).unwrap();
        assert!(csv.starts_with("label,M_true,r_obs,M_rec,rel\n"));
        assert_eq!(csv.lines().count(), 6);

        let energy = bound_energy_step(&fx.ctx()).unwrap();
        assert_eq!(energy["report"], Value::from("agent_out/reports/bound_energy.txt"));
    }

    #[test]
    fn ring_step_uses_fixed_alpha() {
        let fx = Fixture::new("run_id: r9\nrings_csv: rings.csv\nrings_alpha: 1.0\n");
        std::fs::write(fx.dir.path().join("rings.csv"), "ring,T\n1,100\n2,80\n3,60\n").unwrap();
        let artifacts = ring_temperature_analysis(&fx.ctx()).unwrap();
        assert_eq!(
            artifacts["predictions"],
            Value::from("reports/r9/ring_temperature_predictions.csv")
        );
        let table =
            std::fs::read_to_string(fx.dir.path().join("reports/r9/ring_temperature_predictions.csv")).unwrap();
        assert!(table.contains("3,60.000000,0.750000,12.909944"), "{table}");
    }

    #[test]
    fn ring_step_fit_without_observations_fails() {
        let fx = Fixture::new("run_id: r9\nrings_csv: rings.csv\n");
        std::fs::write(fx.dir.path().join("rings.csv"), "ring,T\n1,100\n2,80\n").unwrap();
        let err = ring_temperature_analysis(&fx.ctx()).unwrap_err();
        assert!(err.message.contains("v_obs"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_tests_command_keeps_log() {
        let fx = Fixture::new("run_id: r2\ntests_command: [sh, -c, \"echo running; exit 1\"]\n");
        let err = tests_step(&fx.ctx()).unwrap_err();
        assert_eq!(err.message, "tests failed: exit code 1");
        let log = err.artifacts["log"].as_str().unwrap();
        assert_eq!(log, "reports/r2/logs/tests.log");
        let text = std::fs::read_to_string(fx.dir.path().join(log)).unwrap();
        assert!(text.contains("running"));
    }

    #[test]
    fn unstartable_tests_command_keeps_log() {
        let fx = Fixture::new("run_id: r4\ntests_command: [no-such-program-ssz, -q]\n");
        let err = tests_step(&fx.ctx()).unwrap_err();
        assert!(err.message.starts_with("tests failed: cannot start 'no-such-program-ssz'"), "{}", err.message);
        let log = err.artifacts["log"].as_str().unwrap();
        assert_eq!(log, "reports/r4/logs/tests.log");
        let text = std::fs::read_to_string(fx.dir.path().join(log)).unwrap();
        assert!(text.contains("failed to start"));
    }

    #[cfg(unix)]
    #[test]
    fn timed_out_tests_command_reports_timeout() {
        let fx = Fixture::new("run_id: r5\ntests_command: [sh, -c, \"sleep 4; echo done\"]\ntests_timeout_s: 1\n");
        let clock = std::time::Instant::now();
        let err = tests_step(&fx.ctx()).unwrap_err();
        assert_eq!(err.message, "tests failed: TIMEOUT");
        assert!(clock.elapsed() < std::time::Duration::from_secs(3));
        assert!(err.artifacts.contains_key("log"));
    }

    #[cfg(unix)]
    #[test]
    fn junit_output_is_summarised() {
        let xml = r#"<testsuites><testsuite tests="4" failures="0" errors="0" skipped="1" time="0.2"></testsuite></testsuites>"#;
        let script = format!("printf '%s' '{xml}' > {{junit}}");
        let yaml = format!("run_id: r3\ntests_command: [sh, -c, {script:?}]\n");
        let fx = Fixture::new(&yaml);
        let artifacts = tests_step(&fx.ctx()).unwrap();
        let summary_rel = artifacts["summary"].as_str().unwrap();
        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(fx.dir.path().join(summary_rel)).unwrap()).unwrap();
        assert_eq!(summary["passed"], Value::from(3));
        assert_eq!(summary["skipped"], Value::from(1));
    }
}
