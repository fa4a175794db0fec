//! Mass round-trip validation and the bound-energy constants.
//!
//! For each canonical mass the φ-scaled radius `r_φ(M) = G·φ·M/c² · (1 + Δ/100)`
//! is computed and then inverted numerically; the relative error of the
//! recovered mass measures how well-conditioned the Δ(M) scaling is.

use serde::Serialize;

use crate::domain::DeltaMParams;
use crate::error::ValidationError;
use crate::models::raw_percent;
use crate::physics::{ALPHA_FS, C, G, H_PLANCK, M_ELECTRON, PHI};

/// Reference objects, mass in kg.
pub const CANONICAL_MASSES: [(&str, f64); 5] = [
    ("Elektron", 9.109_383_56e-31),
    ("Mond", 7.342e22),
    ("Erde", 5.972_19e24),
    ("Sonne", 1.988_47e30),
    ("Sagittarius A*", 8.544_455_59e36),
];

const MAX_ITER: usize = 100;
const REL_TOL: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassValidationRow {
    pub label: String,
    pub m_true: f64,
    pub r_obs: f64,
    pub m_rec: f64,
    pub rel: f64,
}

/// Δ(M) with the log10-mass range taken from the canonical set.
#[derive(Debug, Clone, Copy)]
pub struct PhiRadius {
    params: DeltaMParams,
    log_lo: f64,
    log_hi: f64,
}

impl PhiRadius {
    pub fn new(params: DeltaMParams) -> Self {
        let logs = CANONICAL_MASSES.iter().map(|(_, m)| m.log10());
        let log_lo = logs.clone().fold(f64::INFINITY, f64::min);
        let log_hi = logs.fold(f64::NEG_INFINITY, f64::max);
        Self { params, log_lo, log_hi }
    }

    /// Normalised log-mass; 1 when the range is degenerate.
    fn norm(&self, mass_kg: f64) -> f64 {
        let span = self.log_hi - self.log_lo;
        if !(span > 0.0) {
            return 1.0;
        }
        ((mass_kg.log10() - self.log_lo) / span).clamp(0.0, 1.0)
    }

    pub fn delta_percent(&self, mass_kg: f64) -> f64 {
        raw_percent(&self.params, mass_kg) * self.norm(mass_kg)
    }

    pub fn radius(&self, mass_kg: f64) -> f64 {
        G * PHI * mass_kg / (C * C) * (1.0 + self.delta_percent(mass_kg) / 100.0)
    }

    /// Invert `radius` with Newton's method on a central-difference slope.
    pub fn recover_mass(&self, r_obs: f64) -> Result<f64, ValidationError> {
        if !(r_obs.is_finite() && r_obs > 0.0) {
            return Err(ValidationError::non_positive("r_obs", r_obs));
        }
        let mut m = r_obs * C * C / (G * PHI);
        for _ in 0..MAX_ITER {
            let h = (1e-8 * m.abs()).max(f64::MIN_POSITIVE);
            let slope = (self.radius(m + h) - self.radius(m - h)) / (2.0 * h);
            if !(slope.is_finite() && slope != 0.0) {
                return Err(ValidationError::Invalid(format!(
                    "mass inversion stalled at M={m:e} (slope {slope})"
                )));
            }
            let next = m - (self.radius(m) - r_obs) / slope;
            if !(next.is_finite() && next > 0.0) {
                return Err(ValidationError::Invalid(format!("mass inversion diverged from M={m:e}")));
            }
            if (next - m).abs() <= REL_TOL * next.abs() {
                return Ok(next);
            }
            m = next;
        }
        tracing::warn!(r_obs, mass = m, "mass inversion did not converge; using last iterate");
        Ok(m)
    }
}

pub fn validate_masses(params: &DeltaMParams) -> Result<Vec<MassValidationRow>, ValidationError> {
    let phi = PhiRadius::new(*params);
    CANONICAL_MASSES
        .iter()
        .map(|(label, m_true)| {
            let r_obs = phi.radius(*m_true);
            let m_rec = phi.recover_mass(r_obs)?;
            Ok(MassValidationRow {
                label: (*label).to_string(),
                m_true: *m_true,
                r_obs,
                m_rec,
                rel: ((m_rec - m_true) / m_true).abs(),
            })
        })
        .collect()
}

/// Electron binding energy at the fine-structure scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundEnergy {
    pub energy_j: f64,
    pub frequency_hz: f64,
    pub wavelength_m: f64,
}

pub fn bound_energy() -> BoundEnergy {
    let energy_j = ALPHA_FS * M_ELECTRON * C * C;
    let frequency_hz = energy_j / H_PLANCK;
    BoundEnergy {
        energy_j,
        frequency_hz,
        wavelength_m: C / frequency_hz,
    }
}

pub fn format_bound_energy(b: &BoundEnergy) -> String {
    let mut out = String::new();
    out.push_str("=== Bound energy (alpha_fs * m_e * c^2) ===\n");
    out.push_str(&format!("alpha_fs      = {ALPHA_FS:.10e}\n"));
    out.push_str(&format!("m_e [kg]      = {M_ELECTRON:.8e}\n"));
    out.push_str(&format!("E_bound [J]   = {:.10e}\n", b.energy_j));
    out.push_str(&format!("f [Hz]        = {:.10e}\n", b.frequency_hz));
    out.push_str(&format!("lambda [m]    = {:.10e}\n", b.wavelength_m));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_masses_round_trip() {
        let rows = validate_masses(&DeltaMParams::default()).unwrap();
        assert_eq!(rows.len(), 5);
        for r in &rows {
            assert!(r.rel < 1e-9, "{}: rel={}", r.label, r.rel);
        }
    }

    #[test]
    fn zero_delta_is_plain_phi_radius() {
        let phi = PhiRadius::new(DeltaMParams {
            a: 0.0,
            b: 0.0,
            alpha: 1.0,
        });
        let m = 1.0e30;
        assert!((phi.radius(m) - G * PHI * m / (C * C)).abs() < 1e-9);
    }

    #[test]
    fn bound_energy_matches_known_scale() {
        let b = bound_energy();
        // alpha_fs * 511 keV ≈ 3.73 keV.
        let ev = b.energy_j / 1.602_176_634e-19;
        assert!((ev - 3728.9).abs() < 1.0, "E={ev} eV");
        assert!((b.frequency_hz * b.wavelength_m - C).abs() / C < 1e-12);
    }
}
