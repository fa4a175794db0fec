//! `z_SEG` dispatch.
//!
//! All four modes are handled in `predict_seg`; the match is total, so adding a
//! mode forces every caller to decide what it means.

use crate::domain::{DeltaMParams, ObservationRow, SegMode};
use crate::models::delta_m::{DeltaM, MassNormalization, delta_m, scale_z_gr};
use crate::physics::compose_available;

/// Baseline predictions already computed for the row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub z_gr: f64,
    pub z_sr: f64,
    pub z_grsr: f64,
}

/// `z_SEG` plus the Δ(M) diagnostics when that branch was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegPrediction {
    pub z_seg: f64,
    pub delta_m: Option<DeltaM>,
}

pub fn predict_seg(
    mode: SegMode,
    row: &ObservationRow,
    base: &Baseline,
    params: &DeltaMParams,
    normalization: &MassNormalization,
) -> SegPrediction {
    match mode {
        SegMode::Hint => plain(hint(row, base)),
        SegMode::Grsr => plain(base.z_grsr),
        SegMode::DeltaM => delta_m_branch(row, base, params, normalization),
        SegMode::Hybrid => {
            if prefers_hint(row) {
                plain(hint(row, base))
            } else {
                delta_m_branch(row, base, params, normalization)
            }
        }
    }
}

/// Hybrid rule: S-star category or Sgr A* case, with a finite hint.
pub fn prefers_hint(row: &ObservationRow) -> bool {
    let has_hint = row.z_geom_hint.is_some_and(f64::is_finite);
    let tagged = row.category.to_lowercase().contains("s-star") || row.case.to_lowercase().contains("sgra");
    tagged && has_hint
}

fn plain(z_seg: f64) -> SegPrediction {
    SegPrediction { z_seg, delta_m: None }
}

fn hint(row: &ObservationRow, base: &Baseline) -> f64 {
    match row.z_geom_hint.filter(|z| z.is_finite()) {
        Some(z_hint) => compose_available(z_hint, base.z_sr),
        None => base.z_grsr,
    }
}

fn delta_m_branch(
    row: &ObservationRow,
    base: &Baseline,
    params: &DeltaMParams,
    normalization: &MassNormalization,
) -> SegPrediction {
    let Some(mass_kg) = row.central_mass_kg() else {
        return plain(compose_available(base.z_gr, base.z_sr));
    };
    let d = delta_m(params, mass_kg, normalization);
    SegPrediction {
        z_seg: compose_available(scale_z_gr(base.z_gr, d.percent), base.z_sr),
        delta_m: Some(d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{compose, z_gravitational, z_special_relativistic, M_SUN};

    fn baseline(row: &ObservationRow) -> Baseline {
        let z_gr = z_gravitational(row.central_mass_kg().unwrap_or(0.0), row.r_emit_m);
        let z_sr = z_special_relativistic(row.v_tot_mps, row.v_los_mps);
        Baseline {
            z_gr,
            z_sr,
            z_grsr: compose_available(z_gr, z_sr),
        }
    }

    fn star() -> ObservationRow {
        ObservationRow {
            case: "S2".to_string(),
            category: "S-stars".to_string(),
            m_solar: Some(4.3e6),
            r_emit_m: Some(1.8e13),
            v_tot_mps: Some(7.6e6),
            v_los_mps: Some(1.0e5),
            z_geom_hint: Some(3.0e-4),
            ..Default::default()
        }
    }

    #[test]
    fn grsr_mode_is_the_composition() {
        let row = star();
        let base = baseline(&row);
        let pred = predict_seg(SegMode::Grsr, &row, &base, &DeltaMParams::default(), &MassNormalization::default());
        assert_eq!(pred.z_seg, compose(base.z_gr, base.z_sr));
        assert!(pred.delta_m.is_none());
    }

    #[test]
    fn hint_mode_uses_hint_or_falls_back() {
        let mut row = star();
        let base = baseline(&row);
        let pred = predict_seg(SegMode::Hint, &row, &base, &DeltaMParams::default(), &MassNormalization::default());
        assert_eq!(pred.z_seg, compose(3.0e-4, base.z_sr));

        row.z_geom_hint = None;
        let pred = predict_seg(SegMode::Hint, &row, &base, &DeltaMParams::default(), &MassNormalization::default());
        assert_eq!(pred.z_seg, base.z_grsr);
    }

    #[test]
    fn delta_m_with_zero_amplitude_equals_grsr_bitwise() {
        let params = DeltaMParams {
            a: 0.0,
            b: 0.0,
            alpha: 7.5,
        };
        let norm = MassNormalization::from_dataset([10.0 * M_SUN, 1e9 * M_SUN], None, None);
        for m in [10.0, 4.3e6, 1e9] {
            let mut row = star();
            row.m_solar = Some(m);
            let base = baseline(&row);
            let pred = predict_seg(SegMode::DeltaM, &row, &base, &params, &norm);
            assert_eq!(pred.z_seg.to_bits(), base.z_grsr.to_bits());
        }
    }

    #[test]
    fn delta_m_scales_gr_then_composes() {
        let row = star();
        let base = baseline(&row);
        let params = DeltaMParams {
            a: 10.0,
            b: 0.0,
            alpha: 0.0,
        };
        let norm = MassNormalization {
            lo: Some(0.0),
            hi: Some(40.0),
        };
        let pred = predict_seg(SegMode::DeltaM, &row, &base, &params, &norm);
        let d = pred.delta_m.unwrap();
        let expected = compose(base.z_gr * (1.0 + d.percent / 100.0), base.z_sr);
        assert!((pred.z_seg - expected).abs() < 1e-18);
        assert!(d.percent > 0.0 && d.percent < 10.0);
    }

    #[test]
    fn delta_m_without_mass_falls_back() {
        let mut row = star();
        row.m_solar = None;
        let base = baseline(&row);
        let pred = predict_seg(SegMode::DeltaM, &row, &base, &DeltaMParams::default(), &MassNormalization::default());
        assert_eq!(pred.z_seg, base.z_grsr);
        assert!(pred.delta_m.is_none());
    }

    #[test]
    fn hybrid_selects_by_category_or_case() {
        let row = star();
        assert!(prefers_hint(&row));

        let mut sgra = star();
        sgra.category = "bh".to_string();
        sgra.case = "SgrA*-flare".to_string();
        assert!(prefers_hint(&sgra));

        let mut plain_row = star();
        plain_row.category = "pulsar".to_string();
        assert!(!prefers_hint(&plain_row));

        let mut no_hint = star();
        no_hint.z_geom_hint = Some(f64::NAN);
        assert!(!prefers_hint(&no_hint));

        let base = baseline(&plain_row);
        let pred = predict_seg(SegMode::Hybrid, &plain_row, &base, &DeltaMParams::default(), &MassNormalization::default());
        assert!(pred.delta_m.is_some());
    }
}
