//! Forward propagation through an ordered shell chain.
//!
//! For shells `k = 1..N`:
//!
//! ```text
//! q_1 = 1,  q_k = (T_k / T_{k-1})^β · (n_k / n_{k-1})^η
//! v_1 = v_0, v_k = v_{k-1} · q_k^(-α/2)
//! γ_k = Π_{i<=k} q_i,  ν_out(k) = ν_in · γ_k^(-1/2)
//! ```
//!
//! Inputs are validated in full before any propagation starts.

use crate::domain::{ChainRow, SegwaveParams, ShellRow};
use crate::error::ValidationError;

/// Shell-to-shell gamma ratio.
///
/// The density factor only applies when `eta != 0` and both densities exist.
pub fn compute_q_factor(
    t_curr: f64,
    t_prev: f64,
    n_curr: Option<f64>,
    n_prev: Option<f64>,
    beta: f64,
    eta: f64,
) -> Result<f64, ValidationError> {
    if !(t_curr.is_finite() && t_curr > 0.0) {
        return Err(ValidationError::non_positive("temperature", t_curr));
    }
    if !(t_prev.is_finite() && t_prev > 0.0) {
        return Err(ValidationError::non_positive("previous temperature", t_prev));
    }

    let mut q = (t_curr / t_prev).powf(beta);

    if eta != 0.0 {
        if let (Some(n_c), Some(n_p)) = (n_curr, n_prev) {
            if !(n_c.is_finite() && n_c > 0.0) {
                return Err(ValidationError::non_positive("density", n_c));
            }
            if !(n_p.is_finite() && n_p > 0.0) {
                return Err(ValidationError::non_positive("previous density", n_p));
            }
            q *= (n_c / n_p).powf(eta);
        }
    }

    Ok(q)
}

/// `q_k` and `v_k` for every shell.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityProfile {
    pub q: Vec<f64>,
    pub v: Vec<f64>,
}

/// Run the velocity recursion over temperature (and optional density) columns.
pub fn velocity_profile(
    temperatures: &[f64],
    densities: Option<&[f64]>,
    params: &SegwaveParams,
) -> Result<VelocityProfile, ValidationError> {
    validate_chain(temperatures, densities)?;
    if !params.v0.is_finite() {
        return Err(ValidationError::Invalid(format!("v0 must be finite (got {})", params.v0)));
    }

    let mut q = Vec::with_capacity(temperatures.len());
    let mut v = Vec::with_capacity(temperatures.len());
    for k in 0..temperatures.len() {
        if k == 0 {
            q.push(1.0);
            v.push(params.v0);
            continue;
        }
        let q_k = compute_q_factor(
            temperatures[k],
            temperatures[k - 1],
            densities.map(|n| n[k]),
            densities.map(|n| n[k - 1]),
            params.beta,
            params.eta,
        )?;
        let v_k = v[k - 1] * q_k.powf(-params.alpha / 2.0);
        q.push(q_k);
        v.push(v_k);
    }

    Ok(VelocityProfile { q, v })
}

fn validate_chain(temperatures: &[f64], densities: Option<&[f64]>) -> Result<(), ValidationError> {
    if temperatures.is_empty() {
        return Err(ValidationError::Invalid("shell chain is empty".to_string()));
    }
    for (k, t) in temperatures.iter().enumerate() {
        if !(t.is_finite() && *t > 0.0) {
            return Err(ValidationError::non_positive(format!("T at shell {}", k + 1), *t));
        }
    }
    if let Some(n) = densities {
        if n.len() != temperatures.len() {
            return Err(ValidationError::LengthMismatch {
                what: "densities vs temperatures".to_string(),
                left: n.len(),
                right: temperatures.len(),
            });
        }
        for (k, d) in n.iter().enumerate() {
            if !(d.is_finite() && *d > 0.0) {
                return Err(ValidationError::non_positive(format!("n at shell {}", k + 1), *d));
            }
        }
    }
    Ok(())
}

/// Running product of the q-series.
pub fn compute_cumulative_gamma(q: &[f64]) -> Vec<f64> {
    q.iter()
        .scan(1.0_f64, |acc, q_k| {
            *acc *= q_k;
            Some(*acc)
        })
        .collect()
}

/// `ν_out(k) = ν_in · γ_k^(-1/2)`.
pub fn predict_frequency_track(nu_in: f64, gamma: &[f64]) -> Result<Vec<f64>, ValidationError> {
    if !(nu_in.is_finite() && nu_in > 0.0) {
        return Err(ValidationError::non_positive("nu_in", nu_in));
    }
    if let Some((k, g)) = gamma.iter().enumerate().find(|(_, g)| !(g.is_finite() && **g > 0.0)) {
        return Err(ValidationError::non_positive(format!("gamma at shell {}", k + 1), *g));
    }
    Ok(gamma.iter().map(|g| nu_in * g.powf(-0.5)).collect())
}

/// Residual summary for `v_pred − v_obs`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualMetrics {
    pub residuals: Vec<f64>,
    pub mae: f64,
    pub rmse: f64,
    pub max_abs_residual: f64,
}

pub fn compute_residuals(v_pred: &[f64], v_obs: &[f64]) -> Result<ResidualMetrics, ValidationError> {
    if v_pred.len() != v_obs.len() {
        return Err(ValidationError::LengthMismatch {
            what: "v_pred vs v_obs".to_string(),
            left: v_pred.len(),
            right: v_obs.len(),
        });
    }
    if v_pred.is_empty() {
        return Err(ValidationError::Invalid("no velocities to compare".to_string()));
    }

    let residuals: Vec<f64> = v_pred.iter().zip(v_obs).map(|(p, o)| p - o).collect();
    let n = residuals.len() as f64;
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
    let rmse = (residuals.iter().map(|r| r * r).sum::<f64>() / n).sqrt();
    let max_abs_residual = residuals.iter().map(|r| r.abs()).fold(0.0, f64::max);

    Ok(ResidualMetrics {
        residuals,
        mae,
        rmse,
        max_abs_residual,
    })
}

/// Propagate a parsed shell table into output rows.
///
/// Densities are used only when every shell carries one. `nu_in`, when given,
/// adds the frequency track.
pub fn propagate_shells(
    shells: &[ShellRow],
    params: &SegwaveParams,
    nu_in: Option<f64>,
) -> Result<Vec<ChainRow>, ValidationError> {
    let temperatures: Vec<f64> = shells.iter().map(|s| s.t).collect();
    let densities = shell_densities(shells, params.eta)?;
    let profile = velocity_profile(&temperatures, densities.as_deref(), params)?;

    let track = match nu_in {
        Some(nu) => Some(predict_frequency_track(nu, &compute_cumulative_gamma(&profile.q))?),
        None => None,
    };

    Ok(shells
        .iter()
        .enumerate()
        .map(|(k, shell)| ChainRow {
            ring: shell.ring.clone(),
            t: shell.t,
            n: shell.n,
            q_k: profile.q[k],
            v_pred: profile.v[k],
            v_obs: shell.v_obs,
            residual: shell.v_obs.map(|obs| profile.v[k] - obs),
            nu_out_hz: track.as_ref().map(|t| t[k]),
        })
        .collect())
}

/// Density column for the recursion, if usable.
pub fn shell_densities(shells: &[ShellRow], eta: f64) -> Result<Option<Vec<f64>>, ValidationError> {
    let present = shells.iter().filter(|s| s.n.is_some()).count();
    if present == 0 {
        return Ok(None);
    }
    if present != shells.len() {
        if eta != 0.0 {
            return Err(ValidationError::Invalid(format!(
                "density `n` given for {present} of {} shells; eta != 0 needs all or none",
                shells.len()
            )));
        }
        return Ok(None);
    }
    Ok(Some(shells.iter().filter_map(|s| s.n).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(alpha: f64) -> SegwaveParams {
        SegwaveParams {
            v0: 10.0,
            alpha,
            beta: 1.0,
            eta: 0.0,
        }
    }

    #[test]
    fn three_shell_baseline() {
        let p = velocity_profile(&[100.0, 80.0, 60.0], None, &params(1.0)).unwrap();
        assert_eq!(p.q[0], 1.0);
        assert!((p.q[1] - 0.8).abs() < 1e-12);
        assert!((p.q[2] - 0.75).abs() < 1e-12);
        assert_eq!(p.v[0], 10.0);
        assert!((p.v[1] - 11.1803).abs() < 1e-4);
        assert!((p.v[2] - 12.9099).abs() < 1e-4);
    }

    #[test]
    fn alpha_zero_is_identity() {
        let temps = [120.0, 15.0, 900.0, 3.3, 47.0];
        let p = velocity_profile(&temps, Some(&[1.0, 2.0, 0.5, 7.0, 3.0]), &SegwaveParams {
            v0: 42.0,
            alpha: 0.0,
            beta: 1.7,
            eta: 0.4,
        })
        .unwrap();
        assert!(p.v.iter().all(|v| *v == 42.0));
    }

    #[test]
    fn decreasing_temperature_accelerates() {
        let temps: Vec<f64> = (0..12).map(|i| 500.0 - 37.0 * i as f64).collect();
        for alpha in [0.05, 1.0, 2.9] {
            let p = velocity_profile(&temps, None, &params(alpha)).unwrap();
            for k in 1..p.v.len() {
                assert!(p.v[k] > p.v[k - 1], "alpha={alpha} k={k}");
            }
        }
    }

    #[test]
    fn output_length_matches_input() {
        let shells: Vec<ShellRow> = (1..=7).map(|i| ShellRow::new(i.to_string(), 100.0 / i as f64)).collect();
        let rows = propagate_shells(&shells, &params(1.0), Some(1.0e9)).unwrap();
        assert_eq!(rows.len(), shells.len());
        assert!(rows.iter().all(|r| r.nu_out_hz.is_some()));
    }

    #[test]
    fn density_factor_applies_only_with_eta() {
        let q = compute_q_factor(50.0, 100.0, Some(4.0), Some(1.0), 1.0, 0.5).unwrap();
        assert!((q - 1.0).abs() < 1e-12);
        let q = compute_q_factor(50.0, 100.0, Some(4.0), Some(1.0), 1.0, 0.0).unwrap();
        assert!((q - 0.5).abs() < 1e-12);
        assert!(compute_q_factor(50.0, 100.0, Some(-4.0), Some(1.0), 1.0, 0.5).is_err());
    }

    #[test]
    fn rejects_non_positive_inputs_before_propagating() {
        let err = velocity_profile(&[100.0, 0.0, 60.0], None, &params(1.0)).unwrap_err();
        assert!(err.to_string().contains("T at shell 2"));
        assert!(velocity_profile(&[], None, &params(1.0)).is_err());
        assert!(velocity_profile(&[1.0, 2.0], Some(&[1.0]), &params(1.0)).is_err());
    }

    #[test]
    fn cumulative_gamma_is_running_product() {
        let q = [1.0, 0.8, 0.75, 1.3, 0.97, 2.5];
        let g = compute_cumulative_gamma(&q);
        let mut prod = 1.0;
        for k in 0..q.len() {
            prod *= q[k];
            assert!(((g[k] - prod) / prod).abs() < 1e-10);
        }
    }

    #[test]
    fn frequency_track_scales_with_gamma() {
        let nu = predict_frequency_track(1.0e9, &[1.0, 0.25, 4.0]).unwrap();
        assert!((nu[0] - 1.0e9).abs() < 1e-3);
        assert!((nu[1] - 2.0e9).abs() < 1e-3);
        assert!((nu[2] - 0.5e9).abs() < 1e-3);
        assert!(predict_frequency_track(1.0e9, &[1.0, 0.0]).is_err());
    }

    #[test]
    fn residual_metrics() {
        let m = compute_residuals(&[1.0, 2.0, 3.0], &[1.0, 1.0, 5.0]).unwrap();
        assert_eq!(m.residuals, vec![0.0, 1.0, -2.0]);
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.rmse - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(m.max_abs_residual, 2.0);
        assert!(compute_residuals(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn partial_density_column_rejected_with_eta() {
        let mut shells = vec![ShellRow::new("1", 100.0), ShellRow::new("2", 80.0)];
        shells[0].n = Some(1.0);
        assert!(shell_densities(&shells, 0.5).is_err());
        assert_eq!(shell_densities(&shells, 0.0).unwrap(), None);
    }
}
