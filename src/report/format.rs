//! Formatted text reports for the redshift and rings pipelines.
//!
//! We keep formatting code in one place so the numeric code stays free of
//! presentation concerns and output changes are localized.

use crate::app::pipeline::{AlphaChoice, RunOutput};
use crate::domain::RedshiftConfig;
use crate::redshift::{PerModel, RedshiftSummary};

/// Text report of a redshift evaluation.
pub fn format_redshift_report(summary: &RedshiftSummary, config: &RedshiftConfig, debug_csv: &str) -> String {
    let mut out = String::new();

    out.push_str("=== SSZ redshift evaluation ===\n");
    out.push_str(&format!(
        "Rows: total={} | usable={} | strong={}\n",
        summary.rows_total, summary.rows_usable, summary.strong_rows
    ));
    out.push_str(&format!("Velocity corrections applied: {}\n", summary.velocity_corrections));
    out.push_str(&format!("seg-mode: {}\n", config.mode.label()));
    out.push_str(&format!(
        "deltaM  : A={}%  B={}%  alpha={:e}  logM_min={}  logM_max={}\n",
        config.delta_m.a,
        config.delta_m.b,
        config.delta_m.alpha,
        fmt_opt(config.logm_min),
        fmt_opt(config.logm_max),
    ));

    out.push_str("\nMedian / Mean / Max |dz|  (n)\n");
    for (label, model) in per_model_rows(summary) {
        out.push_str(&format!(
            "  {label:<6} {:>12} {:>12} {:>12}  ({})\n",
            fmt_sci(model.median),
            fmt_sci(model.mean),
            fmt_sci(model.max),
            model.count,
        ));
    }

    out.push_str("\nBootstrap 95% CI of the median\n");
    for (label, model) in per_model_rows(summary) {
        let ci = model
            .ci
            .map(|[lo, hi]| format!("[{lo:.3e}, {hi:.3e}]"))
            .unwrap_or_else(|| "n/a".to_string());
        out.push_str(&format!("  {label:<6} {ci}\n"));
    }

    let p = &summary.paired;
    out.push_str("\nPaired sign test (SEG vs GR*SR)\n");
    out.push_str(&format!(
        "  SEG better: {}/{}  ties={}  rows={}  p(two-sided)={:.3e}\n",
        p.wins, p.n, p.ties, p.n_rows, p.p_two_sided
    ));
    if let Some(ratio) = summary.seg_to_grsr_ratio() {
        let verdict = if ratio < 1.0 { "better" } else { "worse" };
        out.push_str(&format!("  median ratio SEG/GR*SR: {ratio:.4}x ({verdict})\n"));
    }
    out.push_str(&format!("  outliers (SEG not better): {}\n", summary.outliers.count));

    if !summary.mass_bins.is_empty() {
        out.push_str("\nMass bins (M_solar)\n");
        out.push_str(&format!(
            "  {:>12} {:>12} {:>6} {:>12} {:>12}\n",
            "lo", "hi", "n", "med_seg", "med_grsr"
        ));
        for b in &summary.mass_bins {
            out.push_str(&format!(
                "  {:>12.4e} {:>12.4e} {:>6} {:>12} {:>12}\n",
                b.lo,
                b.hi,
                b.count,
                fmt_sci(b.median_seg),
                fmt_sci(b.median_grsr)
            ));
        }
    }

    out.push_str(&format!("\nDebug CSV: {debug_csv}\n"));
    out
}

/// One model's column of the summary.
struct ModelLine {
    median: Option<f64>,
    mean: Option<f64>,
    max: Option<f64>,
    count: usize,
    ci: Option<[f64; 2]>,
}

fn per_model_rows(s: &RedshiftSummary) -> [(&'static str, ModelLine); 4] {
    let line = |pick: fn(&PerModel<Option<f64>>) -> Option<f64>, count: usize, ci: Option<[f64; 2]>| ModelLine {
        median: pick(&s.medians),
        mean: pick(&s.means),
        max: pick(&s.maxima),
        count,
        ci,
    };
    [
        ("Seg", line(|m| m.seg, s.counts.seg, s.cis.seg)),
        ("GR", line(|m| m.gr, s.counts.gr, s.cis.gr)),
        ("SR", line(|m| m.sr, s.counts.sr, s.cis.sr)),
        ("GR*SR", line(|m| m.grsr, s.counts.grsr, s.cis.grsr)),
    ]
}

/// Text report of a rings run.
pub fn format_rings_report(run: &RunOutput) -> String {
    let mut out = String::new();
    let params = &run.params;

    out.push_str("=== Segmented radio-wave propagation ===\n");

    out.push_str("\nPARAMETERS\n");
    out.push_str(&format!("  v0 [km/s] : {:.6}\n", params.v0));
    match (&run.config.alpha, &run.fit) {
        (AlphaChoice::Fit { lo, hi }, Some(fit)) => out.push_str(&format!(
            "  alpha     : {:.6} (fitted in [{lo}, {hi}], evaluations={}, converged={})\n",
            fit.alpha, fit.evaluations, fit.converged
        )),
        _ => out.push_str(&format!("  alpha     : {:.6} (fixed)\n", params.alpha)),
    }
    out.push_str(&format!("  beta      : {:.6}\n", params.beta));
    out.push_str(&format!("  eta       : {:.6}\n", params.eta));
    if let Some(nu) = run.config.nu_in {
        out.push_str(&format!("  nu_in [Hz]: {nu:.6e}\n"));
    }

    out.push_str("\nDATA\n");
    out.push_str(&format!("  csv       : {}\n", run.config.csv.display()));
    out.push_str(&format!("  shells    : {}\n", run.table.shells.len()));
    out.push_str(&format!(
        "  columns   : n={} v_obs={}\n",
        yes_no(run.table.has_n),
        yes_no(run.table.has_v_obs)
    ));

    out.push_str("\nPREDICTIONS\n");
    let with_obs = run.metrics.is_some();
    let mut header = format!("  {:<10} {:>12} {:>10} {:>12}", "ring", "T", "q_k", "v_pred");
    if with_obs {
        header.push_str(&format!(" {:>12} {:>12}", "v_obs", "residual"));
    }
    out.push_str(header.trim_end());
    out.push('\n');
    for r in &run.chain {
        let mut line = format!("  {:<10} {:>12.3} {:>10.6} {:>12.6}", r.ring, r.t, r.q_k, r.v_pred);
        if with_obs {
            line.push_str(&format!(
                " {:>12} {:>12}",
                r.v_obs.map(|v| format!("{v:.6}")).unwrap_or_default(),
                r.residual.map(|v| format!("{v:.6}")).unwrap_or_default()
            ));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    if let Some(m) = &run.metrics {
        out.push_str("\nVALIDATION METRICS\n");
        out.push_str(&format!("  MAE       : {:.6}\n", m.mae));
        out.push_str(&format!("  RMSE      : {:.6}\n", m.rmse));
        out.push_str(&format!("  max|res|  : {:.6}\n", m.max_abs_residual));
    }

    if run.config.nu_in.is_some() {
        out.push_str("\nFREQUENCY TRACK\n");
        match &run.track_warning {
            Some(w) => out.push_str(&format!("  WARNING: frequency track not computed: {w}\n")),
            None => {
                for r in &run.chain {
                    if let Some(nu) = r.nu_out_hz {
                        out.push_str(&format!("  {:<10} {nu:.6e} Hz\n", r.ring));
                    }
                }
            }
        }
    }

    out
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "dataset".to_string())
}

fn fmt_sci(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.4e}")).unwrap_or_else(|| "n/a".to_string())
}
