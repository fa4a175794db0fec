//! Shared "rings pipeline" used by both the `ssz-rings` CLI and the suite's
//! `ring_temperature_analysis` step.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! shell CSV -> (optional α fit) -> forward propagation -> residuals -> frequency track
//!
//! Callers then only decide where the table and report go.

use std::path::PathBuf;

use crate::domain::{ChainRow, SegwaveParams};
use crate::error::ValidationError;
use crate::io::{ShellTable, load_shells};
use crate::segwave::{
    AlphaFit, AlphaGrid, DEFAULT_ALPHA_BOUNDS, Observations, ResidualMetrics, compute_cumulative_gamma,
    compute_residuals, evaluate_alpha_grid, fit_alpha, predict_frequency_track, propagate_shells, shell_densities,
};

/// Number of α values in the optional grid scan.
pub const GRID_STEPS: usize = 60;

/// How α is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaChoice {
    Fixed(f64),
    Fit { lo: f64, hi: f64 },
}

impl Default for AlphaChoice {
    fn default() -> Self {
        AlphaChoice::Fit {
            lo: DEFAULT_ALPHA_BOUNDS.0,
            hi: DEFAULT_ALPHA_BOUNDS.1,
        }
    }
}

/// Inputs of one rings run.
#[derive(Debug, Clone, PartialEq)]
pub struct RingsConfig {
    pub csv: PathBuf,
    pub v0: f64,
    pub alpha: AlphaChoice,
    pub beta: f64,
    pub eta: f64,
    pub nu_in: Option<f64>,
    /// Also scan RMSE over an even α grid within the fit bounds.
    pub grid: bool,
}

/// All computed outputs of a single rings run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub config: RingsConfig,
    pub table: ShellTable,
    pub params: SegwaveParams,
    pub fit: Option<AlphaFit>,
    pub chain: Vec<ChainRow>,
    pub metrics: Option<ResidualMetrics>,
    pub grid: Option<AlphaGrid>,
    /// Why the frequency track is missing although `nu_in` was given.
    pub track_warning: Option<String>,
}

impl RunOutput {
    pub fn has_track(&self) -> bool {
        self.chain.iter().any(|r| r.nu_out_hz.is_some())
    }
}

/// Execute the rings pipeline and return the computed outputs.
pub fn run_rings(config: &RingsConfig) -> Result<RunOutput, ValidationError> {
    let table = load_shells(&config.csv)?;
    run_rings_with_table(config, table)
}

/// Execute the pipeline on an already-parsed shell table.
pub fn run_rings_with_table(config: &RingsConfig, table: ShellTable) -> Result<RunOutput, ValidationError> {
    if !(config.v0.is_finite() && config.v0 > 0.0) {
        return Err(ValidationError::non_positive("v0", config.v0));
    }

    let observed = table.observed_velocities();
    let temperatures: Vec<f64> = table.shells.iter().map(|s| s.t).collect();
    let densities = shell_densities(&table.shells, config.eta)?;

    // 1) Resolve α (fixed, or fitted against v_obs).
    let (alpha, fit, bounds) = match config.alpha {
        AlphaChoice::Fixed(alpha) => (alpha, None, DEFAULT_ALPHA_BOUNDS),
        AlphaChoice::Fit { lo, hi } => {
            let v_obs = observed.as_deref().ok_or_else(|| {
                ValidationError::MissingColumn("v_obs (required for every shell when fitting alpha)".to_string())
            })?;
            let obs = Observations {
                temperatures: &temperatures,
                densities: densities.as_deref(),
                v_obs,
            };
            let fit = fit_alpha(&obs, config.v0, config.beta, config.eta, (lo, hi))?;
            tracing::info!(alpha = fit.alpha, rmse = fit.rmse, evaluations = fit.evaluations, "alpha fitted");
            (fit.alpha, Some(fit), (lo, hi))
        }
    };
    let params = SegwaveParams {
        v0: config.v0,
        alpha,
        beta: config.beta,
        eta: config.eta,
    };

    // 2) Forward propagation.
    let mut chain = propagate_shells(&table.shells, &params, None)?;

    // 3) Residual metrics when every shell is observed.
    let metrics = match &observed {
        Some(v_obs) => {
            let v_pred: Vec<f64> = chain.iter().map(|r| r.v_pred).collect();
            Some(compute_residuals(&v_pred, v_obs)?)
        }
        None => None,
    };

    // 4) Frequency track; a failure here is reported, not fatal.
    let mut track_warning = None;
    if let Some(nu_in) = config.nu_in {
        let q: Vec<f64> = chain.iter().map(|r| r.q_k).collect();
        match predict_frequency_track(nu_in, &compute_cumulative_gamma(&q)) {
            Ok(track) => {
                for (row, nu) in chain.iter_mut().zip(track) {
                    row.nu_out_hz = Some(nu);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "frequency track skipped");
                track_warning = Some(e.to_string());
            }
        }
    }

    // 5) Optional α scan.
    let grid = match (&observed, config.grid) {
        (Some(v_obs), true) => {
            let obs = Observations {
                temperatures: &temperatures,
                densities: densities.as_deref(),
                v_obs,
            };
            Some(evaluate_alpha_grid(&obs, config.v0, config.beta, config.eta, bounds, GRID_STEPS)?)
        }
        _ => None,
    };

    Ok(RunOutput {
        config: config.clone(),
        table,
        params,
        fit,
        chain,
        metrics,
        grid,
        track_warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_shells;

    fn config(alpha: AlphaChoice) -> RingsConfig {
        RingsConfig {
            csv: PathBuf::from("unused.csv"),
            v0: 10.0,
            alpha,
            beta: 1.0,
            eta: 0.0,
            nu_in: None,
            grid: false,
        }
    }

    #[test]
    fn fixed_alpha_baseline_chain() {
        let table = read_shells("ring,T\n1,100\n2,80\n3,60\n".as_bytes()).unwrap();
        let out = run_rings_with_table(&config(AlphaChoice::Fixed(1.0)), table).unwrap();
        assert_eq!(out.chain.len(), 3);
        assert!((out.chain[1].v_pred - 11.1803).abs() < 1e-4);
        assert!((out.chain[2].v_pred - 12.9099).abs() < 1e-4);
        assert!(out.metrics.is_none());
        assert!(out.fit.is_none());
    }

    #[test]
    fn fit_requires_observed_velocities() {
        let table = read_shells("ring,T\n1,100\n2,80\n".as_bytes()).unwrap();
        let err = run_rings_with_table(&config(AlphaChoice::default()), table).unwrap_err();
        assert!(matches!(err, ValidationError::MissingColumn(_)));
    }

    #[test]
    fn fit_recovers_alpha_and_scans_grid() {
        let table = read_shells(
            "ring,T,v_obs\n1,100,10\n2,80,11.180339887498949\n3,60,12.909944487358056\n".as_bytes(),
        )
        .unwrap();
        let mut cfg = config(AlphaChoice::default());
        cfg.grid = true;
        let out = run_rings_with_table(&cfg, table).unwrap();
        assert!((out.params.alpha - 1.0).abs() < 1e-4, "alpha={}", out.params.alpha);
        assert!(out.metrics.unwrap().rmse < 1e-3);
        assert_eq!(out.grid.unwrap().alphas.len(), GRID_STEPS);
    }

    #[test]
    fn bad_nu_in_is_a_warning() {
        let table = read_shells("ring,T\n1,100\n2,80\n".as_bytes()).unwrap();
        let mut cfg = config(AlphaChoice::Fixed(1.0));
        cfg.nu_in = Some(-1.0);
        let out = run_rings_with_table(&cfg, table).unwrap();
        assert!(out.track_warning.is_some());
        assert!(!out.has_track());
    }
}
