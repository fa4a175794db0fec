//! Shell CSV ingest for the segwave chain.
//!
//! Mandatory columns `ring, T`; optional `n, v_obs`. File order defines `k`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::ShellRow;
use crate::error::ValidationError;
use crate::io::ingest::{build_header_map, csv_reader, get_optional, parse_opt_f64};

/// Parsed shell table.
#[derive(Debug, Clone)]
pub struct ShellTable {
    pub shells: Vec<ShellRow>,
    /// The file has a `v_obs` column (values may still be blank).
    pub has_v_obs: bool,
    pub has_n: bool,
}

impl ShellTable {
    /// Observed velocities, when every shell has one.
    pub fn observed_velocities(&self) -> Option<Vec<f64>> {
        self.shells.iter().map(|s| s.v_obs).collect()
    }
}

pub fn load_shells(path: &Path) -> Result<ShellTable, ValidationError> {
    let file = File::open(path).map_err(|e| ValidationError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    read_shells(file)
}

pub fn read_shells<R: Read>(input: R) -> Result<ShellTable, ValidationError> {
    let mut reader = csv_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| ValidationError::Invalid(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    for required in ["ring", "t"] {
        if !header_map.contains_key(required) {
            let name = if required == "t" { "T" } else { required };
            return Err(ValidationError::MissingColumn(name.to_string()));
        }
    }

    let mut shells = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| ValidationError::Invalid(format!("line {line}: CSV parse error: {e}")))?;

        let ring = get_optional(&record, &header_map, "ring")
            .ok_or_else(|| ValidationError::MissingValue {
                line,
                column: "ring".to_string(),
            })?
            .to_string();
        let t = parse_opt_f64(get_optional(&record, &header_map, "t"), line, "T")?.ok_or_else(|| {
            ValidationError::MissingValue {
                line,
                column: "T".to_string(),
            }
        })?;
        if t <= 0.0 {
            return Err(ValidationError::non_positive(format!("line {line}: T"), t));
        }
        let n = parse_opt_f64(get_optional(&record, &header_map, "n"), line, "n")?;
        if let Some(n) = n {
            if n <= 0.0 {
                return Err(ValidationError::non_positive(format!("line {line}: n"), n));
            }
        }
        let v_obs = parse_opt_f64(get_optional(&record, &header_map, "v_obs"), line, "v_obs")?;

        shells.push(ShellRow { ring, t, n, v_obs });
    }

    if shells.is_empty() {
        return Err(ValidationError::Invalid("shell CSV contains no rows".to_string()));
    }

    Ok(ShellTable {
        shells,
        has_v_obs: header_map.contains_key("v_obs"),
        has_n: header_map.contains_key("n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ordered_shells() {
        let csv = "ring,T,n,v_obs\n1,100,1e3,10\n2,80,,11.2\nouter,60,2e3,\n";
        let table = read_shells(csv.as_bytes()).unwrap();
        assert!(table.has_v_obs);
        assert!(table.has_n);
        assert_eq!(table.shells.len(), 3);
        assert_eq!(table.shells[2].ring, "outer");
        assert_eq!(table.shells[1].n, None);
        assert_eq!(table.observed_velocities(), None);
    }

    #[test]
    fn observed_velocities_when_complete() {
        let csv = "ring,T,v_obs\n1,100,10\n2,80,11\n";
        let table = read_shells(csv.as_bytes()).unwrap();
        assert_eq!(table.observed_velocities(), Some(vec![10.0, 11.0]));
    }

    #[test]
    fn rejects_bad_shells() {
        assert!(matches!(
            read_shells("ring,n\n1,2\n".as_bytes()),
            Err(ValidationError::MissingColumn(_))
        ));
        assert!(read_shells("ring,T\n1,0\n".as_bytes()).is_err());
        assert!(read_shells("ring,T\n1,-5\n".as_bytes()).is_err());
        assert!(read_shells("ring,T,n\n1,10,-1\n".as_bytes()).is_err());
        assert!(read_shells("ring,T\n,10\n".as_bytes()).is_err());
        assert!(read_shells("ring,T\n1,hot\n".as_bytes()).is_err());
        assert!(read_shells("ring,T\n".as_bytes()).is_err());
    }
}
