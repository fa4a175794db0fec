//! Per-row redshift evaluation.
//!
//! The mass normalisation is resolved once over the whole table before any
//! row is evaluated, so a row's prediction never depends on its position.

use crate::domain::{ObservationRow, PredictionRow, RadiusSource, RedshiftConfig, ZSource};
use crate::models::{Baseline, METHOD_VIS_VIVA, MassNormalization, correct_velocity, delta_m, predict_seg};
use crate::physics::{
    G, compose_available, orbit_radius, schwarzschild_radius, vis_viva, z_gravitational, z_special_relativistic,
};

pub const NOTE_NO_OBSERVED_Z: &str = "no observed z";

/// Predictions for a whole table plus the dataset-scoped state they used.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub rows: Vec<PredictionRow>,
    pub normalization: MassNormalization,
    pub strong_rows: usize,
    pub velocity_corrections: usize,
}

impl Evaluation {
    pub fn usable(&self) -> impl Iterator<Item = &PredictionRow> {
        self.rows.iter().filter(|r| r.is_usable())
    }
}

pub fn evaluate_rows(rows: &[ObservationRow], config: &RedshiftConfig) -> Evaluation {
    let normalization = MassNormalization::from_dataset(
        rows.iter().filter_map(ObservationRow::central_mass_kg),
        config.logm_min,
        config.logm_max,
    );

    let predictions: Vec<PredictionRow> = rows
        .iter()
        .map(|row| evaluate_row(row, config, &normalization))
        .collect();

    let strong_rows = predictions.iter().filter(|r| r.is_usable() && r.strong).count();
    let velocity_corrections = predictions
        .iter()
        .filter(|r| r.is_usable() && r.v_correction_method != crate::models::METHOD_ORIGINAL)
        .count();

    Evaluation {
        rows: predictions,
        normalization,
        strong_rows,
        velocity_corrections,
    }
}

/// Observed redshift and where it came from.
///
/// With `prefer_z` a finite `z` wins; otherwise a valid frequency pair wins and
/// `z` is the fallback.
pub fn observed_z(row: &ObservationRow, prefer_z: bool) -> (Option<f64>, ZSource) {
    let z = row.z.filter(|z| z.is_finite());
    let from_freq = match (row.f_emit_hz, row.f_obs_hz) {
        (Some(emit), Some(obs)) if emit.is_finite() && obs.is_finite() && obs != 0.0 => Some(emit / obs - 1.0),
        _ => None,
    };

    match (z, from_freq) {
        (Some(z), _) if prefer_z => (Some(z), ZSource::Z),
        (_, Some(zf)) => (Some(zf), ZSource::Freq),
        (Some(z), None) => (Some(z), ZSource::Z),
        (None, None) => (None, ZSource::Missing),
    }
}

/// `r_emit_m` when usable, else the orbit radius of a strong row.
pub fn effective_radius(row: &ObservationRow) -> (Option<f64>, RadiusSource) {
    if let Some(r) = row.r_emit_m.filter(|r| r.is_finite() && *r > 0.0) {
        return (Some(r), RadiusSource::Emission);
    }
    if row.is_strong() {
        if let (Some(a), Some(e), Some(f_deg)) = (row.a_m, row.e, row.f_true_deg) {
            let r = orbit_radius(a, e, f_deg.to_radians());
            if r.is_finite() {
                return (Some(r), RadiusSource::Orbit);
            }
        }
    }
    (None, RadiusSource::Missing)
}

pub fn evaluate_row(row: &ObservationRow, config: &RedshiftConfig, normalization: &MassNormalization) -> PredictionRow {
    let (z_obs, z_source) = observed_z(row, config.prefer_z);
    let strong = row.is_strong();
    let mass_kg = row.central_mass_kg();
    let (r_eff, r_source) = effective_radius(row);

    let v_los_eff = row.v_los_mps.filter(|v| v.is_finite()).unwrap_or(0.0);
    let correction = correct_velocity(&row.category, &row.source, row.v_tot_mps, row.v_los_mps);
    let (mut v_tot, mut method) = (correction.v_tot, correction.method);

    if v_tot.is_none() && strong {
        if let (Some(m), Some(r), Some(a)) = (mass_kg, r_eff, row.a_m) {
            if r != 0.0 && a != 0.0 {
                let v = vis_viva(G * m, a, r);
                if v.is_finite() {
                    v_tot = Some(v);
                    method = METHOD_VIS_VIVA.to_string();
                }
            }
        }
    }

    let z_gr = mass_kg.map_or(f64::NAN, |m| z_gravitational(m, r_eff));
    let z_sr = z_special_relativistic(v_tot, Some(v_los_eff));
    if !z_sr.is_finite() {
        tracing::debug!(case = %row.case, line = row.line, "SR redshift not computed (no total velocity)");
    }
    let z_grsr = compose_available(z_gr, z_sr);
    let base = Baseline { z_gr, z_sr, z_grsr };

    let seg = predict_seg(config.mode, row, &base, &config.delta_m, normalization);
    let dm = seg.delta_m.or_else(|| {
        if config.mode.uses_delta_m() {
            mass_kg.map(|m| delta_m(&config.delta_m, m, normalization))
        } else {
            None
        }
    });

    let abs = |model: f64| match z_obs {
        Some(z) if model.is_finite() => (z - model).abs(),
        _ => f64::NAN,
    };

    let note = if z_obs.is_none() {
        tracing::warn!(case = %row.case, line = row.line, "no observed z; row excluded from statistics");
        Some(NOTE_NO_OBSERVED_Z.to_string())
    } else {
        None
    };

    PredictionRow {
        line: row.line,
        case: row.case.clone(),
        category: row.category.clone(),
        m_solar: row.m_solar,
        z_obs,
        z_source,
        z_seg: seg.z_seg,
        z_gr,
        z_sr,
        z_grsr,
        abs_seg: abs(seg.z_seg),
        abs_gr: abs(z_gr),
        abs_sr: abs(z_sr),
        abs_grsr: abs(z_grsr),
        r_eff_m: r_eff,
        r_source,
        v_tot_original: row.v_tot_mps,
        v_tot_corrected: v_tot.filter(|v| v.is_finite()),
        v_correction_method: method,
        v_los_eff,
        rs_m: mass_kg.map(schwarzschild_radius),
        delta_m_percent: dm.map(|d| d.percent),
        log10m_norm: dm.map(|d| d.norm),
        strong,
        in_paired_test: row.in_paired_test(),
        note,
        extras: row.extras.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeltaMParams, SegMode};
    use crate::physics::{C, M_SUN, compose};

    fn config(mode: SegMode) -> RedshiftConfig {
        RedshiftConfig {
            mode,
            ..RedshiftConfig::default()
        }
    }

    fn row(case: &str) -> ObservationRow {
        ObservationRow {
            line: 2,
            case: case.to_string(),
            ..ObservationRow::default()
        }
    }

    #[test]
    fn observed_z_selection() {
        let mut r = row("A");
        r.z = Some(0.1);
        r.f_emit_hz = Some(2.0);
        r.f_obs_hz = Some(1.0);
        assert_eq!(observed_z(&r, true), (Some(0.1), ZSource::Z));
        assert_eq!(observed_z(&r, false), (Some(1.0), ZSource::Freq));

        r.f_obs_hz = Some(0.0);
        assert_eq!(observed_z(&r, false), (Some(0.1), ZSource::Z));

        r.z = None;
        assert_eq!(observed_z(&r, true), (None, ZSource::Missing));
    }

    #[test]
    fn orbit_radius_used_for_strong_rows() {
        let mut r = row("S2");
        r.m_solar = Some(4.3e6);
        r.a_m = Some(1.5e14);
        r.e = Some(0.88);
        r.f_true_deg = Some(0.0);
        let (radius, src) = effective_radius(&r);
        assert_eq!(src, RadiusSource::Orbit);
        assert!((radius.unwrap() - 1.5e14 * (1.0 - 0.88)).abs() / 1.8e13 < 1e-12);

        r.r_emit_m = Some(2.0e13);
        assert_eq!(effective_radius(&r), (Some(2.0e13), RadiusSource::Emission));

        r.r_emit_m = None;
        r.m_solar = None;
        assert_eq!(effective_radius(&r), (None, RadiusSource::Missing));
    }

    #[test]
    fn unusable_row_keeps_note_and_no_residuals() {
        let r = row("empty");
        let out = evaluate_row(&r, &config(SegMode::Grsr), &MassNormalization::default());
        assert!(!out.is_usable());
        assert_eq!(out.note.as_deref(), Some(NOTE_NO_OBSERVED_Z));
        assert!(out.abs_seg.is_nan() && out.abs_grsr.is_nan());
    }

    #[test]
    fn grsr_mode_matches_composition() {
        let mut r = row("star");
        r.m_solar = Some(1.0);
        r.r_emit_m = Some(7.0e8);
        r.v_tot_mps = Some(3.0e4);
        r.v_los_mps = Some(1.0e4);
        r.z = Some(3e-6);
        let out = evaluate_row(&r, &config(SegMode::Grsr), &MassNormalization::default());
        assert_eq!(out.z_grsr.to_bits(), compose(out.z_gr, out.z_sr).to_bits());
        assert_eq!(out.z_seg.to_bits(), out.z_grsr.to_bits());
        assert!((out.abs_grsr - (3e-6 - out.z_grsr).abs()).abs() < 1e-18);
        assert!(out.delta_m_percent.is_none());
    }

    #[test]
    fn horizon_radius_makes_gr_nan_only() {
        let mut r = row("inside");
        r.m_solar = Some(10.0);
        r.r_emit_m = Some(1000.0);
        r.v_tot_mps = Some(1.0e5);
        r.z = Some(0.01);
        let out = evaluate_row(&r, &config(SegMode::Grsr), &MassNormalization::default());
        assert!(out.z_gr.is_nan());
        assert!(out.abs_gr.is_nan());
        assert!(out.abs_sr.is_finite());
        assert!(out.abs_grsr.is_finite());
    }

    #[test]
    fn vis_viva_fills_missing_velocity() {
        let mut r = row("S2");
        r.m_solar = Some(4.3e6);
        r.a_m = Some(1.5e14);
        r.e = Some(0.88);
        r.f_true_deg = Some(0.0);
        r.z = Some(6.7e-4);
        let out = evaluate_row(&r, &config(SegMode::Grsr), &MassNormalization::default());
        assert_eq!(out.v_correction_method, METHOD_VIS_VIVA);
        let v = out.v_tot_corrected.unwrap();
        assert!(v > 1.0e6 && v < 0.1 * C, "v={v}");
    }

    #[test]
    fn delta_m_zero_amplitude_is_grsr() {
        let rows: Vec<ObservationRow> = (0..4)
            .map(|i| {
                let mut r = row(&format!("R{i}"));
                r.m_solar = Some(10f64.powi(i));
                r.r_emit_m = Some(1.0e9 * (i + 1) as f64);
                r.v_tot_mps = Some(1.0e4 * (i + 1) as f64);
                r.z = Some(1e-5);
                r
            })
            .collect();
        let mut cfg = config(SegMode::DeltaM);
        cfg.delta_m = DeltaMParams {
            a: 0.0,
            b: 0.0,
            alpha: 123.0,
        };
        let eval = evaluate_rows(&rows, &cfg);
        for p in &eval.rows {
            assert_eq!(p.z_seg.to_bits(), p.z_grsr.to_bits(), "{}", p.case);
        }
    }

    #[test]
    fn normalization_is_row_order_free() {
        let mk = |case: &str, m: f64| {
            let mut r = row(case);
            r.m_solar = Some(m);
            r.r_emit_m = Some(1.0e10);
            r.z = Some(1e-4);
            r
        };
        let a = vec![mk("a", 1.0), mk("b", 1e3), mk("c", 1e6)];
        let b = vec![mk("c", 1e6), mk("a", 1.0), mk("b", 1e3)];
        let cfg = config(SegMode::DeltaM);
        let ea = evaluate_rows(&a, &cfg);
        let eb = evaluate_rows(&b, &cfg);
        let find = |e: &Evaluation, case: &str| e.rows.iter().find(|r| r.case == case).map(|r| r.z_seg).unwrap();
        for case in ["a", "b", "c"] {
            assert_eq!(find(&ea, case).to_bits(), find(&eb, case).to_bits());
        }
        assert!((ea.normalization.lo.unwrap() - M_SUN.log10()).abs() < 1e-12);
    }
}
