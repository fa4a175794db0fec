//! Suite YAML configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{DeltaMParams, RedshiftConfig, SegMode};
use crate::error::{AppError, EXIT_INVALID};

/// Suite depth; `fast` shortens timeouts and may filter the test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteMode {
    Fast,
    #[default]
    Full,
}

impl SuiteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SuiteMode::Fast => "fast",
            SuiteMode::Full => "full",
        }
    }
}

/// One entry of the `steps` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawStepEntry")]
pub struct StepEntry {
    pub name: String,
    pub enabled: bool,
}

/// A step is either a bare name or `{name, enabled}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawStepEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default = "yes")]
        enabled: bool,
    },
}

impl From<RawStepEntry> for StepEntry {
    fn from(raw: RawStepEntry) -> Self {
        match raw {
            RawStepEntry::Name(name) => StepEntry { name, enabled: true },
            RawStepEntry::Full { name, enabled } => StepEntry { name, enabled },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuiteConfig {
    pub run_id: String,
    #[serde(default)]
    pub mode: SuiteMode,
    #[serde(default = "default_window")]
    pub time_window_days: u32,
    #[serde(default)]
    pub prefer_parquet: bool,
    #[serde(default)]
    pub steps: Vec<StepEntry>,
    #[serde(default = "default_seed")]
    pub seed: u64,

    // redshift_eval / mass_validation
    pub redshift_csv: Option<PathBuf>,
    #[serde(default = "default_seg_mode")]
    pub seg_mode: SegMode,
    #[serde(default = "yes")]
    pub prefer_z: bool,
    #[serde(default = "default_deltam_a")]
    pub deltam_a: f64,
    #[serde(default)]
    pub deltam_b: f64,
    #[serde(default = "default_deltam_alpha")]
    pub deltam_alpha: f64,
    pub logm_min: Option<f64>,
    pub logm_max: Option<f64>,
    #[serde(default = "default_bootstrap")]
    pub bootstrap_samples: usize,
    #[serde(default)]
    pub junit_check: bool,

    // ring_temperature_analysis
    pub rings_csv: Option<PathBuf>,
    #[serde(default = "default_v0")]
    pub rings_v0: f64,
    pub rings_alpha: Option<f64>,
    #[serde(default = "default_beta")]
    pub rings_beta: f64,
    #[serde(default)]
    pub rings_eta: f64,
    pub rings_nu_in: Option<f64>,

    // tests
    pub tests_command: Option<Vec<String>>,
    pub tests_timeout_s: Option<u64>,

    /// Anything else; each key is reported once.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

fn yes() -> bool {
    true
}
fn default_window() -> u32 {
    7
}
fn default_seed() -> u64 {
    1234
}
fn default_seg_mode() -> SegMode {
    SegMode::Hybrid
}
fn default_deltam_a() -> f64 {
    DeltaMParams::default().a
}
fn default_deltam_alpha() -> f64 {
    DeltaMParams::default().alpha
}
fn default_bootstrap() -> usize {
    2000
}
fn default_v0() -> f64 {
    10.0
}
fn default_beta() -> f64 {
    1.0
}

impl SuiteConfig {
    pub fn enabled_steps(&self) -> impl Iterator<Item = &StepEntry> {
        self.steps.iter().filter(|s| s.enabled)
    }

    pub fn redshift_config(&self) -> RedshiftConfig {
        RedshiftConfig {
            mode: self.seg_mode,
            prefer_z: self.prefer_z,
            delta_m: self.delta_m(),
            logm_min: self.logm_min,
            logm_max: self.logm_max,
            bootstrap_samples: self.bootstrap_samples,
            seed: self.seed,
        }
    }

    pub fn delta_m(&self) -> DeltaMParams {
        DeltaMParams {
            a: self.deltam_a,
            b: self.deltam_b,
            alpha: self.deltam_alpha,
        }
    }

    pub fn tests_timeout(&self) -> Duration {
        let default = match self.mode {
            SuiteMode::Fast => 120,
            SuiteMode::Full => 600,
        };
        Duration::from_secs(self.tests_timeout_s.unwrap_or(default))
    }

    /// Log one warning per unrecognised top-level key.
    pub fn warn_unknown_keys(&self) {
        for key in self.unknown.keys() {
            tracing::warn!(key = %key, "unknown config key ignored");
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        let id = self.run_id.trim();
        if id.is_empty() {
            return Err(AppError::new(EXIT_INVALID, "config: `run_id` must not be empty"));
        }
        if id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(AppError::new(
                EXIT_INVALID,
                format!("config: `run_id` must be a single path component (got '{id}')"),
            ));
        }
        Ok(())
    }
}

/// Parse a suite config YAML string.
pub fn parse_config_str(yaml: &str) -> Result<SuiteConfig, AppError> {
    let config: SuiteConfig = serde_yaml::from_str(yaml)
        .map_err(|e| AppError::new(EXIT_INVALID, format!("Failed to parse suite config: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Parse a suite config YAML file.
pub fn load_config(path: &Path) -> Result<SuiteConfig, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::new(EXIT_INVALID, format!("Failed to read suite config '{}': {e}", path.display()))
    })?;
    parse_config_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = parse_config_str("run_id: r1\n").unwrap();
        assert_eq!(cfg.mode, SuiteMode::Full);
        assert_eq!(cfg.time_window_days, 7);
        assert_eq!(cfg.seed, 1234);
        assert_eq!(cfg.seg_mode, SegMode::Hybrid);
        assert_eq!(cfg.tests_timeout(), Duration::from_secs(600));
        assert!(cfg.steps.is_empty());
        assert!(cfg.unknown.is_empty());
    }

    #[test]
    fn step_entries_accept_both_shapes() {
        let yaml = "run_id: r1\nmode: fast\nsteps:\n  - redshift_eval\n  - {name: tests, enabled: false}\n  - name: bound_energy\n";
        let cfg = parse_config_str(yaml).unwrap();
        assert_eq!(
            cfg.steps,
            vec![
                StepEntry {
                    name: "redshift_eval".to_string(),
                    enabled: true
                },
                StepEntry {
                    name: "tests".to_string(),
                    enabled: false
                },
                StepEntry {
                    name: "bound_energy".to_string(),
                    enabled: true
                },
            ]
        );
        assert_eq!(cfg.enabled_steps().count(), 2);
        assert_eq!(cfg.tests_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn unknown_keys_are_collected() {
        let cfg = parse_config_str("run_id: r1\nplot_dpi: 300\nseg_mode: deltaM\n").unwrap();
        assert_eq!(cfg.unknown.keys().collect::<Vec<_>>(), vec!["plot_dpi"]);
        assert_eq!(cfg.seg_mode, SegMode::DeltaM);
    }

    #[test]
    fn run_id_is_required_and_sane() {
        assert!(parse_config_str("mode: fast\n").is_err());
        assert!(parse_config_str("run_id: ''\n").is_err());
        let err = parse_config_str("run_id: ../escape\n").unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INVALID);
    }
}
