//! Run manifest written once at the end of every suite run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::domain::ArtifactMap;
use crate::error::AppError;
use crate::io::write_json;
use crate::suite::artifacts::Artifact;
use crate::suite::changed_files::ChangedFiles;

pub const MANIFEST_PATH: &str = "ci/suite_manifest.json";
pub const CHANGED_FILES_PATH: &str = "ci/changed_files.json";

/// RFC 3339 with microseconds, UTC.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Outcome of one step; never revised once pushed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub name: String,
    pub t_start: String,
    pub t_end: String,
    pub dt_s: f64,
    pub ok: bool,
    /// Not run because no step of that name is registered; never counts as a failure.
    #[serde(default)]
    pub skipped: bool,
    pub error: Option<String>,
    pub artifacts: ArtifactMap,
}

/// The changed-files sidecar as referenced from the manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ChangedFilesRef {
    pub path: String,
    #[serde(flatten)]
    pub snapshot: ChangedFiles,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteManifest {
    pub run_id: String,
    pub mode: String,
    pub started: String,
    pub finished: String,
    pub duration_s: f64,
    /// Suite log, relative to the root.
    pub log: String,
    pub interrupted: bool,
    pub steps: Vec<StepResult>,
    pub changed_files: ChangedFilesRef,
    /// Hashed files in registration order.
    pub artifacts: Vec<Artifact>,
}

impl SuiteManifest {
    pub fn ok_count(&self) -> usize {
        self.steps.iter().filter(|s| s.ok).count()
    }

    pub fn fail_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok && !s.skipped).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.steps.iter().filter(|s| s.skipped).count()
    }
}

/// Write `ci/suite_manifest.json` under `root`.
pub fn write_manifest(root: &Path, manifest: &SuiteManifest) -> Result<PathBuf, AppError> {
    let path = root.join(MANIFEST_PATH);
    write_json(&path, manifest)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_carry_microseconds() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::microseconds(42);
        assert_eq!(timestamp(at), "2024-05-01T12:00:00.000042Z");
    }

    #[test]
    fn counts_and_serialized_shape() {
        let step = |name: &str, ok: bool| StepResult {
            name: name.to_string(),
            t_start: "a".to_string(),
            t_end: "b".to_string(),
            dt_s: 0.5,
            ok,
            skipped: false,
            error: (!ok).then(|| "boom".to_string()),
            artifacts: ArtifactMap::new(),
        };
        let manifest = SuiteManifest {
            run_id: "r1".to_string(),
            mode: "full".to_string(),
            started: "s".to_string(),
            finished: "f".to_string(),
            duration_s: 1.0,
            log: "reports/r1/logs/suite.log".to_string(),
            interrupted: false,
            steps: vec![
                step("one", true),
                step("two", false),
                StepResult {
                    skipped: true,
                    error: Some("unknown step 'three'; skipped".to_string()),
                    ..step("three", false)
                },
            ],
            changed_files: ChangedFilesRef {
                path: CHANGED_FILES_PATH.to_string(),
                snapshot: ChangedFiles {
                    since: "x".to_string(),
                    time_window_days: 7,
                    count: 0,
                    files: Vec::new(),
                },
            },
            artifacts: Vec::new(),
        };
        assert_eq!(manifest.ok_count(), 1);
        assert_eq!(manifest.fail_count(), 1);
        assert_eq!(manifest.skipped_count(), 1);

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["steps"][0]["error"], serde_json::Value::Null);
        assert_eq!(json["steps"][1]["error"], "boom");
        assert_eq!(json["steps"][2]["skipped"], true);
        assert_eq!(json["changed_files"]["path"], CHANGED_FILES_PATH);
        assert_eq!(json["changed_files"]["time_window_days"], 7);
    }
}
