//! Export evaluation results to CSV, JSON and text.
//!
//! CSV files are written row by row with fixed formatting so diffs between runs
//! are meaningful. Non-finite and absent numbers become empty cells.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::{ChainRow, PredictionRow};
use crate::error::AppError;
use crate::redshift::MassValidationRow;
use crate::segwave::AlphaGrid;

/// Per-row redshift dump, unusable rows included.
///
/// `extra_columns` are appended after the fixed columns, in input order.
pub fn write_debug_csv(path: &Path, rows: &[PredictionRow], extra_columns: &[String]) -> Result<(), AppError> {
    let mut file = create(path, "debug CSV")?;

    let mut header = String::from(
        "case,line,category,M_solar,z_obs,z_source,z_seg,z_gr,z_sr,z_grsr,abs_seg,abs_gr,abs_sr,abs_grsr,\
         r_eff_m,r_source,v_tot_original,v_tot_corrected,v_correction_method,v_los_eff,rs_m,\
         deltaM_percent,log10M_norm,strong,in_paired_test,note",
    );
    for name in extra_columns {
        header.push(',');
        header.push_str(&csv_field(name));
    }
    writeln!(file, "{header}").map_err(|e| write_err("debug CSV header", e))?;

    for r in rows {
        let mut line = format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            csv_field(&r.case),
            r.line,
            csv_field(&r.category),
            num_opt(r.m_solar),
            num_opt(r.z_obs),
            r.z_source.as_str(),
            num(r.z_seg),
            num(r.z_gr),
            num(r.z_sr),
            num(r.z_grsr),
            num(r.abs_seg),
            num(r.abs_gr),
            num(r.abs_sr),
            num(r.abs_grsr),
            num_opt(r.r_eff_m),
            csv_field(r.r_source.as_str()),
            num_opt(r.v_tot_original),
            num_opt(r.v_tot_corrected),
            csv_field(&r.v_correction_method),
            num(r.v_los_eff),
            num_opt(r.rs_m),
            num_opt(r.delta_m_percent),
            num_opt(r.log10m_norm),
            r.strong,
            r.in_paired_test,
            csv_field(r.note.as_deref().unwrap_or("")),
        );
        for name in extra_columns {
            let value = r
                .extras
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .unwrap_or("");
            line.push(',');
            line.push_str(&csv_field(value));
        }
        writeln!(file, "{line}").map_err(|e| write_err("debug CSV row", e))?;
    }

    flush(file, "debug CSV")
}

/// Segwave predictions: `ring,T,[n],q_k,v_pred,[v_obs,residual],[nu_out_Hz]`, six decimals.
pub fn write_chain_csv(path: &Path, rows: &[ChainRow], with_n: bool, with_obs: bool) -> Result<(), AppError> {
    let mut file = create(path, "predictions CSV")?;
    let with_nu = rows.iter().any(|r| r.nu_out_hz.is_some());

    let mut header = vec!["ring", "T"];
    if with_n {
        header.push("n");
    }
    header.extend(["q_k", "v_pred"]);
    if with_obs {
        header.extend(["v_obs", "residual"]);
    }
    if with_nu {
        header.push("nu_out_Hz");
    }
    writeln!(file, "{}", header.join(",")).map_err(|e| write_err("predictions CSV header", e))?;

    for r in rows {
        let mut cells = vec![csv_field(&r.ring), format!("{:.6}", r.t)];
        if with_n {
            cells.push(fixed6(r.n));
        }
        cells.push(format!("{:.6}", r.q_k));
        cells.push(format!("{:.6}", r.v_pred));
        if with_obs {
            cells.push(fixed6(r.v_obs));
            cells.push(fixed6(r.residual));
        }
        if with_nu {
            cells.push(fixed6(r.nu_out_hz));
        }
        writeln!(file, "{}", cells.join(",")).map_err(|e| write_err("predictions CSV row", e))?;
    }

    flush(file, "predictions CSV")
}

/// α scan as `alpha,rmse`.
pub fn write_alpha_grid_csv(path: &Path, grid: &AlphaGrid) -> Result<(), AppError> {
    let mut file = create(path, "alpha grid CSV")?;
    writeln!(file, "alpha,rmse").map_err(|e| write_err("alpha grid CSV header", e))?;
    for (alpha, rmse) in grid.alphas.iter().zip(&grid.rmse) {
        writeln!(file, "{alpha:.6},{}", fixed6(Some(*rmse))).map_err(|e| write_err("alpha grid CSV row", e))?;
    }
    flush(file, "alpha grid CSV")
}

pub fn write_mass_validation_csv(path: &Path, rows: &[MassValidationRow]) -> Result<(), AppError> {
    let mut file = create(path, "mass validation CSV")?;
    writeln!(file, "label,M_true,r_obs,M_rec,rel").map_err(|e| write_err("mass validation CSV header", e))?;
    for r in rows {
        writeln!(
            file,
            "{},{:.12e},{:.12e},{:.12e},{:.3e}",
            csv_field(&r.label),
            r.m_true,
            r.r_obs,
            r.m_rec,
            r.rel
        )
        .map_err(|e| write_err("mass validation CSV row", e))?;
    }
    flush(file, "mass validation CSV")
}

/// Pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = create(path, "JSON")?;
    let mut writer = file;
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| AppError::new(2, format!("Failed to write JSON '{}': {e}", path.display())))?;
    writeln!(writer).map_err(|e| write_err("JSON", e))?;
    flush(writer, "JSON")
}

pub fn write_text(path: &Path, text: &str) -> Result<(), AppError> {
    let mut file = create(path, "text file")?;
    file.write_all(text.as_bytes()).map_err(|e| write_err("text file", e))?;
    flush(file, "text file")
}

fn create(path: &Path, what: &str) -> Result<BufWriter<File>, AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))?;
    Ok(BufWriter::new(file))
}

fn flush(mut writer: BufWriter<File>, what: &str) -> Result<(), AppError> {
    writer.flush().map_err(|e| write_err(what, e))
}

fn write_err(what: &str, e: std::io::Error) -> AppError {
    AppError::new(2, format!("Failed to write {what}: {e}"))
}

/// Shortest round-trip representation; empty when not finite.
fn num(v: f64) -> String {
    if v.is_finite() { format!("{v}") } else { String::new() }
}

fn num_opt(v: Option<f64>) -> String {
    v.map(num).unwrap_or_default()
}

fn fixed6(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => format!("{v:.6}"),
        _ => String::new(),
    }
}

/// Quote a CSV cell when it contains a delimiter, quote or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ShellRow;
    use crate::domain::SegwaveParams;
    use crate::segwave::propagate_shells;
    use pretty_assertions::assert_eq;

    #[test]
    fn csv_field_quotes_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(
            csv_field("fixed_negative(v_rad=1,v_tan=2)"),
            "\"fixed_negative(v_rad=1,v_tan=2)\""
        );
        assert_eq!(csv_field("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn chain_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        let mut shells = vec![ShellRow::new("1", 100.0), ShellRow::new("2", 80.0)];
        shells[0].v_obs = Some(10.0);
        shells[1].v_obs = Some(11.0);
        let params = SegwaveParams {
            v0: 10.0,
            alpha: 1.0,
            beta: 1.0,
            eta: 0.0,
        };
        let rows = propagate_shells(&shells, &params, None).unwrap();
        write_chain_csv(&path, &rows, false, true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ring,T,q_k,v_pred,v_obs,residual");
        assert_eq!(lines[1], "1,100.000000,1.000000,10.000000,10.000000,0.000000");
        assert!(lines[2].starts_with("2,80.000000,0.800000,11.180340,11.000000,0.180340"));
    }

    #[test]
    fn json_is_pretty_with_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_json(&path, &serde_json::json!({"n": 3})).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"n\": 3\n}\n");
    }
}
