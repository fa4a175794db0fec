//! Mass-dependent Δ(M) correction.
//!
//! `Δ = (A·exp(−α·r_s) + B) · norm(log10 M)` in percent, where `norm` maps
//! `log10(M/kg)` linearly onto `[0, 1]`. The normalisation bounds depend on
//! the whole dataset, so they are resolved once (`MassNormalization`) before
//! any row is evaluated and then shared by every row.

use crate::domain::DeltaMParams;
use crate::physics::schwarzschild_radius;

/// Half-width (dex) used when no usable range exists.
const FALLBACK_HALF_WIDTH: f64 = 0.5;

/// Resolved log10-mass bounds for `norm`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassNormalization {
    pub lo: Option<f64>,
    pub hi: Option<f64>,
}

impl MassNormalization {
    /// Bounds from dataset extrema, with explicit overrides taking precedence
    /// per side.
    ///
    /// Only finite positive masses count. A dataset whose extrema coincide is
    /// widened by ±0.5 dex.
    pub fn from_dataset<I>(masses_kg: I, override_lo: Option<f64>, override_hi: Option<f64>) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let (data_lo, data_hi) = dataset_log_range(masses_kg);
        Self {
            lo: override_lo.or(data_lo),
            hi: override_hi.or(data_hi),
        }
    }

    /// `norm(log10 M)` clamped to `[0, 1]`.
    ///
    /// Falls back to `log10 M ± 0.5` when bounds are missing or inverted.
    pub fn norm(&self, log_m: f64) -> f64 {
        let (lo, hi) = match (self.lo, self.hi) {
            (Some(lo), Some(hi)) if hi > lo => (lo, hi),
            _ => (log_m - FALLBACK_HALF_WIDTH, log_m + FALLBACK_HALF_WIDTH),
        };
        ((log_m - lo) / (hi - lo)).clamp(0.0, 1.0)
    }
}

fn dataset_log_range<I>(masses_kg: I) -> (Option<f64>, Option<f64>)
where
    I: IntoIterator<Item = f64>,
{
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for m in masses_kg {
        if m.is_finite() && m > 0.0 {
            let l = m.log10();
            lo = lo.min(l);
            hi = hi.max(l);
        }
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (None, None);
    }
    if (hi - lo).abs() < 1e-12 {
        return (Some(lo - FALLBACK_HALF_WIDTH), Some(lo + FALLBACK_HALF_WIDTH));
    }
    (Some(lo), Some(hi))
}

/// Δ(M) evaluated for one central mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaM {
    pub percent: f64,
    pub norm: f64,
    pub rs_m: f64,
}

/// Un-normalised amplitude `A·exp(−α·r_s) + B` (percent).
pub fn raw_percent(params: &DeltaMParams, mass_kg: f64) -> f64 {
    let rs = schwarzschild_radius(mass_kg);
    params.a * (-params.alpha * rs).exp() + params.b
}

pub fn delta_m(params: &DeltaMParams, mass_kg: f64, normalization: &MassNormalization) -> DeltaM {
    let rs_m = schwarzschild_radius(mass_kg);
    let norm = normalization.norm(mass_kg.log10());
    DeltaM {
        percent: raw_percent(params, mass_kg) * norm,
        norm,
        rs_m,
    }
}

/// Scale `z_GR` (not `1 + z_GR`) by `1 + Δ/100`.
pub fn scale_z_gr(z_gr: f64, percent: f64) -> f64 {
    z_gr * (1.0 + percent / 100.0)
}
