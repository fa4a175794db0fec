//! Aggregate statistics over evaluated rows.
//!
//! Every reduction goes through `math::stats`, which sorts before reducing, so
//! the outputs are bit-identical under any row permutation.

use serde::Serialize;

use crate::domain::{PredictionRow, RedshiftConfig};
use crate::math::{binomial_two_sided, bootstrap_median_ci, max, mean, median};
use crate::redshift::evaluate::Evaluation;

pub const MAX_MASS_BINS: usize = 8;
const CI_ALPHA: f64 = 0.05;

/// One value per model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerModel<T> {
    pub seg: T,
    pub gr: T,
    pub sr: T,
    pub grsr: T,
}

impl<T> PerModel<T> {
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerModel<U> {
        PerModel {
            seg: f(&self.seg),
            gr: f(&self.gr),
            sr: f(&self.sr),
            grsr: f(&self.grsr),
        }
    }
}

/// Finite absolute residuals of usable rows, per model.
pub fn residual_columns(rows: &[PredictionRow]) -> PerModel<Vec<f64>> {
    let usable: Vec<&PredictionRow> = rows.iter().filter(|r| r.is_usable()).collect();
    let column = |pick: fn(&PredictionRow) -> f64| -> Vec<f64> {
        usable.iter().map(|r| pick(r)).filter(|v| v.is_finite()).collect()
    };
    PerModel {
        seg: column(|r| r.abs_seg),
        gr: column(|r| r.abs_gr),
        sr: column(|r| r.abs_sr),
        grsr: column(|r| r.abs_grsr),
    }
}

/// Two-sided sign test of SEG against GR×SR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairedStats {
    /// Pairs with different residuals (ties excluded).
    pub n: usize,
    /// Pairs where SEG is strictly closer.
    pub wins: usize,
    pub p_two_sided: f64,
    /// Rows with both residuals finite.
    pub n_rows: usize,
    pub ties: usize,
}

pub fn paired_sign_test_columns(seg: &[f64], grsr: &[f64]) -> PairedStats {
    let mut n_rows = 0;
    let mut wins = 0;
    let mut ties = 0;
    for (s, g) in seg.iter().zip(grsr) {
        if !(s.is_finite() && g.is_finite()) {
            continue;
        }
        n_rows += 1;
        if s < g {
            wins += 1;
        } else if s == g {
            ties += 1;
        }
    }
    let n = n_rows - ties;
    PairedStats {
        n,
        wins,
        p_two_sided: binomial_two_sided(wins, n),
        n_rows,
        ties,
    }
}

/// Paired test over usable rows that take part in it.
pub fn paired_sign_test(rows: &[PredictionRow]) -> PairedStats {
    let (seg, grsr): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter(|r| r.is_usable() && r.in_paired_test)
        .map(|r| (r.abs_seg, r.abs_grsr))
        .unzip();
    paired_sign_test_columns(&seg, &grsr)
}

/// Rows where SEG is not closer than GR×SR.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outliers {
    pub count: usize,
    pub cases: Vec<String>,
}

pub fn outliers(rows: &[PredictionRow]) -> Outliers {
    let cases: Vec<String> = rows
        .iter()
        .filter(|r| r.is_usable() && r.abs_seg.is_finite() && r.abs_grsr.is_finite())
        .filter(|r| r.abs_seg >= r.abs_grsr)
        .map(|r| r.case.clone())
        .collect();
    Outliers {
        count: cases.len(),
        cases,
    }
}

/// Equal-count mass bin with per-model medians.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassBin {
    /// Mass bounds in solar masses.
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
    pub median_seg: Option<f64>,
    pub median_grsr: Option<f64>,
}

/// Up to `max_bins` equal-count bins over usable rows with a mass, by `M_solar`.
///
/// Bin boundaries never split equal masses, so no two bins share an edge value.
pub fn mass_bins(rows: &[PredictionRow], max_bins: usize) -> Vec<MassBin> {
    let mut sorted: Vec<&PredictionRow> = rows
        .iter()
        .filter(|r| r.is_usable() && r.m_solar.is_some_and(f64::is_finite))
        .collect();
    if sorted.is_empty() || max_bins == 0 {
        return Vec::new();
    }
    sorted.sort_by(|a, b| {
        let (ma, mb) = (a.m_solar.unwrap_or_default(), b.m_solar.unwrap_or_default());
        ma.total_cmp(&mb).then_with(|| a.line.cmp(&b.line))
    });
    let mass = |i: usize| sorted[i].m_solar.unwrap_or_default();

    let n = sorted.len();
    let bins = max_bins.min(n);
    let mut edges = vec![0usize];
    for i in 1..bins {
        let mut cut = (i * n + bins / 2) / bins;
        while cut < n && cut > 0 && mass(cut) == mass(cut - 1) {
            cut += 1;
        }
        if cut < n && cut > edges.last().copied().unwrap_or(0) {
            edges.push(cut);
        }
    }
    edges.push(n);

    edges
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| {
            let members = &sorted[w[0]..w[1]];
            let seg: Vec<f64> = members.iter().map(|r| r.abs_seg).collect();
            let grsr: Vec<f64> = members.iter().map(|r| r.abs_grsr).collect();
            MassBin {
                lo: mass(w[0]),
                hi: mass(w[1] - 1),
                count: members.len(),
                median_seg: median(&seg),
                median_grsr: median(&grsr),
            }
        })
        .collect()
}

/// Everything the redshift step reports.
#[derive(Debug, Clone, Serialize)]
pub struct RedshiftSummary {
    pub rows_total: usize,
    pub rows_usable: usize,
    pub strong_rows: usize,
    pub velocity_corrections: usize,
    pub medians: PerModel<Option<f64>>,
    pub means: PerModel<Option<f64>>,
    pub maxima: PerModel<Option<f64>>,
    pub counts: PerModel<usize>,
    pub cis: PerModel<Option<[f64; 2]>>,
    pub paired: PairedStats,
    pub outliers: Outliers,
    pub mass_bins: Vec<MassBin>,
}

impl RedshiftSummary {
    /// SEG median over GR×SR median, when both exist.
    pub fn seg_to_grsr_ratio(&self) -> Option<f64> {
        match (self.medians.seg, self.medians.grsr) {
            (Some(s), Some(g)) if g != 0.0 => Some(s / g),
            _ => None,
        }
    }
}

pub fn summarize(eval: &Evaluation, config: &RedshiftConfig) -> RedshiftSummary {
    let columns = residual_columns(&eval.rows);
    let cis = columns.map(|col| {
        bootstrap_median_ci(col, config.bootstrap_samples, CI_ALPHA, config.seed).map(|(lo, hi)| [lo, hi])
    });

    RedshiftSummary {
        rows_total: eval.rows.len(),
        rows_usable: eval.usable().count(),
        strong_rows: eval.strong_rows,
        velocity_corrections: eval.velocity_corrections,
        medians: columns.map(|c| median(c)),
        means: columns.map(|c| mean(c)),
        maxima: columns.map(|c| max(c)),
        counts: columns.map(Vec::len),
        cis,
        paired: paired_sign_test(&eval.rows),
        outliers: outliers(&eval.rows),
        mass_bins: mass_bins(&eval.rows, MAX_MASS_BINS),
    }
}
