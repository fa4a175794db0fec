//! Observation CSV ingest.
//!
//! Turns a heterogeneous observation table into `ObservationRow`s.
//!
//! Design goals:
//! - **Explicit schema**: a fixed list of recognised columns (with aliases),
//!   matched case-insensitively; everything else is passed through untouched
//! - **Strict rows**: a value that violates an input invariant aborts ingest
//!   with the offending line number
//! - **Sparse values**: empty strings and `nan`/`none` are absent, not errors
//! - **No evaluation here**: deciding whether a row is usable belongs to `redshift`

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{DataType, ObservationRow};
use crate::error::ValidationError;
use crate::physics::C;

/// Header names (lower-case) consumed by `parse_observation`.
const KNOWN_COLUMNS: [&str; 17] = [
    "case",
    "name",
    "source",
    "category",
    "m_solar",
    "r_emit_m",
    "a_m",
    "e",
    "f_true_deg",
    "v_tot_mps",
    "v_los_mps",
    "z_geom_hint",
    "z_hint",
    "z",
    "f_emit_hz",
    "f_obs_hz",
    "data_type",
];

const CASE_COLUMNS: [&str; 2] = ["case", "name"];
const HINT_COLUMNS: [&str; 2] = ["z_geom_hint", "z_hint"];

/// Parsed observation table.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    pub rows: Vec<ObservationRow>,
    /// Unrecognised headers in file order (original spelling).
    pub extra_columns: Vec<String>,
    pub rows_read: usize,
}

/// Load an observation CSV from disk.
pub fn load_observations(path: &Path) -> Result<ObservationTable, ValidationError> {
    let file = File::open(path).map_err(|e| ValidationError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    read_observations(file)
}

/// Parse an observation CSV from any reader.
pub fn read_observations<R: Read>(input: R) -> Result<ObservationTable, ValidationError> {
    let mut reader = csv_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| ValidationError::Invalid(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let has_z = header_map.contains_key("z");
    let has_freq = header_map.contains_key("f_emit_hz") && header_map.contains_key("f_obs_hz");
    if !has_z && !has_freq {
        return Err(ValidationError::MissingColumn("z (or f_emit_Hz + f_obs_Hz)".to_string()));
    }

    let extra_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !KNOWN_COLUMNS.contains(&normalize_header_name(name).as_str()))
        .map(|(idx, _)| idx)
        .collect();
    let extra_columns = extra_idx
        .iter()
        .filter_map(|idx| headers.get(*idx))
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| ValidationError::Invalid(format!("line {line}: CSV parse error: {e}")))?;
        let mut row = parse_observation(&record, &header_map, line)?;
        if row.case.is_empty() {
            row.case = format!("ROW{idx}");
        }
        row.extras = extra_idx
            .iter()
            .map(|i| {
                let name = headers.get(*i).unwrap_or_default().trim().trim_start_matches('\u{feff}');
                (name.to_string(), record.get(*i).unwrap_or_default().trim().to_string())
            })
            .collect();
        validate_observation(&row)?;
        rows.push(row);
    }

    let rows_read = rows.len();
    Ok(ObservationTable {
        rows,
        extra_columns,
        rows_read,
    })
}

fn parse_observation(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    line: usize,
) -> Result<ObservationRow, ValidationError> {
    let num = |name: &str| parse_opt_f64(get_optional(record, header_map, name), line, name);
    let num_any = |names: &[&str]| -> Result<Option<f64>, ValidationError> {
        for name in names {
            if let Some(v) = num(name)? {
                return Ok(Some(v));
            }
        }
        Ok(None)
    };
    let text = |name: &str| get_optional(record, header_map, name).unwrap_or_default().to_string();

    let case = CASE_COLUMNS
        .iter()
        .find_map(|name| get_optional(record, header_map, name))
        .unwrap_or_default()
        .to_string();

    let data_type = match get_optional(record, header_map, "data_type") {
        Some(raw) => Some(DataType::parse(raw).ok_or_else(|| {
            ValidationError::Invalid(format!(
                "line {line}: unknown data_type '{raw}' (expected emission_line, continuum or mixed)"
            ))
        })?),
        None => None,
    };

    Ok(ObservationRow {
        line,
        case,
        source: text("source"),
        category: text("category"),
        m_solar: num("m_solar")?,
        r_emit_m: num("r_emit_m")?,
        a_m: num("a_m")?,
        e: num("e")?,
        f_true_deg: num("f_true_deg")?,
        v_tot_mps: num("v_tot_mps")?,
        v_los_mps: num("v_los_mps")?,
        z_geom_hint: num_any(&HINT_COLUMNS)?,
        z: num("z")?,
        f_emit_hz: num("f_emit_hz")?,
        f_obs_hz: num("f_obs_hz")?,
        data_type,
        extras: Vec::new(),
    })
}

/// Reject rows that violate the input invariants.
///
/// `r_emit_m` inside the horizon is deliberately allowed: it only makes the
/// GR prediction undefined for that row.
fn validate_observation(row: &ObservationRow) -> Result<(), ValidationError> {
    let line = row.line;
    if let Some(m) = row.m_solar {
        if m <= 0.0 {
            return Err(ValidationError::non_positive(format!("line {line}: M_solar"), m));
        }
    }
    if let Some(e) = row.e {
        if !(0.0..1.0).contains(&e) {
            return Err(ValidationError::out_of_range(
                format!("line {line}: e"),
                format!("eccentricity must lie in [0, 1) (got {e})"),
            ));
        }
    }
    if let Some(v) = row.v_tot_mps {
        if v.abs() >= C {
            return Err(ValidationError::out_of_range(
                format!("line {line}: v_tot_mps"),
                format!("|v_tot| must be below c (got {v})"),
            ));
        }
    }
    if let Some(f) = row.f_obs_hz {
        if f <= 0.0 {
            return Err(ValidationError::non_positive(format!("line {line}: f_obs_Hz"), f));
        }
    }
    Ok(())
}

pub(crate) fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins on duplicate headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

pub(crate) fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

pub(crate) fn get_optional<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_null_token(s))
}

fn is_null_token(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "nan" | "none" | "null" | "na")
}

/// Parse an optional numeric cell; text that is not a number is an error.
pub(crate) fn parse_opt_f64(s: Option<&str>, line: usize, column: &str) -> Result<Option<f64>, ValidationError> {
    let Some(s) = s else { return Ok(None) };
    let v = s.parse::<f64>().map_err(|_| ValidationError::NotNumeric {
        line,
        column: column.to_string(),
        value: s.to_string(),
    })?;
    Ok(if v.is_finite() { Some(v) } else { None })
}
