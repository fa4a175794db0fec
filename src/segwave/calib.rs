//! Calibration of the segwave exponent α against observed velocities.
//!
//! The objective is the RMSE of `v_pred − v_obs`; every candidate α reruns the
//! full forward recursion. Candidates whose evaluation fails score a large
//! finite penalty so the search keeps going.

use rayon::prelude::*;

use crate::domain::SegwaveParams;
use crate::error::ValidationError;
use crate::math::minimize_bounded;
use crate::segwave::propagation::{compute_residuals, velocity_profile};

pub const DEFAULT_ALPHA_BOUNDS: (f64, f64) = (0.1, 3.0);

const PENALTY: f64 = 1e10;
const XATOL: f64 = 1e-8;
const MAX_EVALS: usize = 500;

/// Observed chain the fit runs against.
#[derive(Debug, Clone, Copy)]
pub struct Observations<'a> {
    pub temperatures: &'a [f64],
    pub densities: Option<&'a [f64]>,
    pub v_obs: &'a [f64],
}

/// Fitted α plus the metrics at that α.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaFit {
    pub alpha: f64,
    pub rmse: f64,
    pub mae: f64,
    pub max_abs_residual: f64,
    pub evaluations: usize,
    pub converged: bool,
}

/// RMSE for one α; errors when the recursion rejects the inputs.
fn rmse_at(obs: &Observations<'_>, v0: f64, beta: f64, eta: f64, alpha: f64) -> Result<f64, ValidationError> {
    let params = SegwaveParams { v0, alpha, beta, eta };
    let profile = velocity_profile(obs.temperatures, obs.densities, &params)?;
    Ok(compute_residuals(&profile.v, obs.v_obs)?.rmse)
}

fn validate(obs: &Observations<'_>) -> Result<(), ValidationError> {
    if obs.v_obs.len() != obs.temperatures.len() {
        return Err(ValidationError::LengthMismatch {
            what: "v_obs vs temperatures".to_string(),
            left: obs.v_obs.len(),
            right: obs.temperatures.len(),
        });
    }
    if let Some(k) = obs.v_obs.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::Invalid(format!("v_obs at shell {} is not finite", k + 1)));
    }
    Ok(())
}

/// Minimise RMSE over `alpha ∈ bounds`.
pub fn fit_alpha(
    obs: &Observations<'_>,
    v0: f64,
    beta: f64,
    eta: f64,
    bounds: (f64, f64),
) -> Result<AlphaFit, ValidationError> {
    validate(obs)?;
    // Surface structural problems (bad T, bad n) before searching.
    velocity_profile(
        obs.temperatures,
        obs.densities,
        &SegwaveParams {
            v0,
            alpha: bounds.0,
            beta,
            eta,
        },
    )?;

    let objective = |alpha: f64| match rmse_at(obs, v0, beta, eta, alpha) {
        Ok(r) if r.is_finite() => r,
        _ => PENALTY,
    };
    let min = minimize_bounded(objective, bounds.0, bounds.1, XATOL, MAX_EVALS)?;
    if !min.converged {
        tracing::warn!(
            evaluations = min.evaluations,
            alpha = min.x,
            "alpha fit hit its evaluation budget; returning best-seen alpha"
        );
    }

    let params = SegwaveParams {
        v0,
        alpha: min.x,
        beta,
        eta,
    };
    let profile = velocity_profile(obs.temperatures, obs.densities, &params)?;
    let metrics = compute_residuals(&profile.v, obs.v_obs)?;

    Ok(AlphaFit {
        alpha: min.x,
        rmse: metrics.rmse,
        mae: metrics.mae,
        max_abs_residual: metrics.max_abs_residual,
        evaluations: min.evaluations,
        converged: min.converged,
    })
}

/// RMSE sampled on an even α grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaGrid {
    pub alphas: Vec<f64>,
    /// `NaN` where the evaluation failed.
    pub rmse: Vec<f64>,
}

pub fn evaluate_alpha_grid(
    obs: &Observations<'_>,
    v0: f64,
    beta: f64,
    eta: f64,
    bounds: (f64, f64),
    steps: usize,
) -> Result<AlphaGrid, ValidationError> {
    validate(obs)?;
    if steps < 2 {
        return Err(ValidationError::Invalid("alpha grid needs at least 2 steps".to_string()));
    }
    let (lo, hi) = bounds;
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(ValidationError::Invalid(format!("invalid alpha bounds [{lo}, {hi}]")));
    }

    let step = (hi - lo) / (steps as f64 - 1.0);
    let alphas: Vec<f64> = (0..steps).map(|i| lo + step * i as f64).collect();
    let rmse: Vec<f64> = alphas
        .par_iter()
        .map(|&alpha| rmse_at(obs, v0, beta, eta, alpha).unwrap_or(f64::NAN))
        .collect();

    Ok(AlphaGrid { alphas, rmse })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand::rngs::StdRng;

    fn synthetic(alpha: f64, seed: u64, n: usize) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let temps: Vec<f64> = (0..n).map(|_| rng.gen_range(20.0..500.0)).collect();
        let params = SegwaveParams {
            v0: 10.0,
            alpha,
            beta: 1.0,
            eta: 0.0,
        };
        let v = velocity_profile(&temps, None, &params).unwrap().v;
        (temps, v)
    }

    #[test]
    fn recovers_known_alpha() {
        let (temps, v_obs) = synthetic(1.25, 42, 10);
        let obs = Observations {
            temperatures: &temps,
            densities: None,
            v_obs: &v_obs,
        };
        let fit = fit_alpha(&obs, 10.0, 1.0, 0.0, DEFAULT_ALPHA_BOUNDS).unwrap();
        assert!((fit.alpha - 1.25).abs() < 1e-3, "alpha={}", fit.alpha);
        assert!(fit.converged);
    }

    #[test]
    fn fit_rejects_length_mismatch_up_front() {
        let obs = Observations {
            temperatures: &[100.0, 80.0],
            densities: None,
            v_obs: &[10.0],
        };
        assert!(fit_alpha(&obs, 10.0, 1.0, 0.0, DEFAULT_ALPHA_BOUNDS).is_err());
    }

    #[test]
    fn fit_rejects_bad_temperature_up_front() {
        let obs = Observations {
            temperatures: &[100.0, -80.0],
            densities: None,
            v_obs: &[10.0, 11.0],
        };
        let err = fit_alpha(&obs, 10.0, 1.0, 0.0, DEFAULT_ALPHA_BOUNDS).unwrap_err();
        assert!(err.to_string().contains("T at shell 2"));
    }

    #[test]
    fn grid_is_ordered_and_minimal_near_truth() {
        let (temps, v_obs) = synthetic(0.8, 7, 10);
        let obs = Observations {
            temperatures: &temps,
            densities: None,
            v_obs: &v_obs,
        };
        let grid = evaluate_alpha_grid(&obs, 10.0, 1.0, 0.0, (0.1, 3.0), 30).unwrap();
        assert_eq!(grid.alphas.len(), 30);
        assert!((grid.alphas[0] - 0.1).abs() < 1e-12);
        assert!((grid.alphas[29] - 3.0).abs() < 1e-12);
        let best = grid
            .rmse
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| grid.alphas[i])
            .unwrap();
        assert!((best - 0.8).abs() <= 0.1);
    }
}
