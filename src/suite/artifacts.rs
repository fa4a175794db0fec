//! Artifact write-scope, registration and integrity checks.
//!
//! Steps never build output paths by hand: they ask `OutputScope::resolve`,
//! which only hands out paths under `agent_out/` or `reports/`. After a step
//! closes, the files it reports are hashed once and recorded as `Artifact`s.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::ArtifactMap;
use crate::error::{AppError, EXIT_INVALID, StepExecutionError};

/// The only top-level directories steps may write into.
pub const ALLOWED_ROOTS: [&str; 2] = ["agent_out", "reports"];

const HASH_CHUNK: usize = 64 * 1024;

/// A write outside the allowed roots was requested.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("refusing to write '{path}': {reason}")]
pub struct ScopeError {
    pub path: String,
    pub reason: String,
}

impl From<ScopeError> for StepExecutionError {
    fn from(err: ScopeError) -> Self {
        StepExecutionError::new(err.to_string())
    }
}

impl From<ScopeError> for AppError {
    fn from(err: ScopeError) -> Self {
        AppError::new(1, err.to_string())
    }
}

/// Resolves repository-relative output paths inside the allowed roots.
#[derive(Debug, Clone)]
pub struct OutputScope {
    root: PathBuf,
}

impl OutputScope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for `rel`, which must start with an allowed root and stay inside it.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> Result<PathBuf, ScopeError> {
        let rel = rel.as_ref();
        let err = |reason: &str| ScopeError {
            path: rel.display().to_string(),
            reason: reason.to_string(),
        };

        let mut components = rel.components();
        let first = match components.next() {
            Some(Component::Normal(first)) => first,
            Some(Component::RootDir | Component::Prefix(_)) => return Err(err("absolute paths are not allowed")),
            _ => return Err(err("path must start with agent_out/ or reports/")),
        };
        if !ALLOWED_ROOTS.iter().any(|r| first == *r) {
            return Err(err("path must start with agent_out/ or reports/"));
        }
        if components.any(|c| !matches!(c, Component::Normal(_))) {
            return Err(err("`..` and other special components are not allowed"));
        }
        Ok(self.root.join(rel))
    }

    /// Like `resolve`, and creates the parent directory.
    pub fn prepare(&self, rel: impl AsRef<Path>) -> Result<PathBuf, StepExecutionError> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Path relative to the root with `/` separators, as recorded in manifests.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// A registered, hashed output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// `<step>.<key>`.
    pub role: String,
    /// Relative to the repository root.
    pub path: String,
    pub sha256: String,
    pub format: String,
    pub size_bytes: u64,
    pub created_utc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Artifact {
    pub fn register(root: &Path, role: impl Into<String>, rel_path: &str) -> std::io::Result<Self> {
        let abs = root.join(rel_path);
        let sha256 = sha256_file(&abs)?;
        let size_bytes = std::fs::metadata(&abs)?.len();
        Ok(Self {
            role: role.into(),
            path: rel_path.to_string(),
            sha256,
            format: infer_format(&abs).to_string(),
            size_bytes,
            created_utc: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            metadata: None,
        })
    }
}

/// Hex SHA-256 of a file, read in fixed-size chunks.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn infer_format(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => "csv",
        "json" => "json",
        "txt" => "text",
        "log" => "log",
        "md" => "markdown",
        "html" | "htm" => "html",
        "xml" => "xml",
        "png" => "png",
        "yaml" | "yml" => "yaml",
        "parquet" => "parquet",
        _ => "binary",
    }
}

/// Register every string value in `artifacts` that names an existing file.
///
/// Nested maps and lists are walked; their roles get the nested key or index
/// appended (`step.key.sub`, `step.key.0`). Files outside the allowed roots
/// are never registered.
pub fn collect_artifacts(scope: &OutputScope, step: &str, artifacts: &ArtifactMap) -> Vec<Artifact> {
    let mut out = Vec::new();
    for (key, value) in artifacts {
        collect_value(scope, &format!("{step}.{key}"), value, &mut out);
    }
    out
}

fn collect_value(scope: &OutputScope, role: &str, value: &serde_json::Value, out: &mut Vec<Artifact>) {
    match value {
        serde_json::Value::String(s) => {
            if s.is_empty() || !scope.root().join(s).is_file() {
                return;
            }
            if let Err(e) = scope.resolve(s) {
                tracing::warn!(role, error = %e, "artifact outside the output roots; not registered");
                return;
            }
            match Artifact::register(scope.root(), role, s) {
                Ok(a) => out.push(a),
                Err(e) => tracing::warn!(path = %s, error = %e, "could not hash artifact"),
            }
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_value(scope, &format!("{role}.{i}"), item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                collect_value(scope, &format!("{role}.{k}"), v, out);
            }
        }
        _ => {}
    }
}

/// A recorded digest that no longer matches the file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub path: String,
    pub expected: String,
    /// `None` when the file is missing or unreadable.
    pub actual: Option<String>,
}

/// Recompute every digest; returns the mismatches.
pub fn verify_artifacts(root: &Path, artifacts: &[Artifact]) -> Vec<Mismatch> {
    artifacts
        .iter()
        .filter_map(|a| {
            let actual = sha256_file(&root.join(&a.path)).ok();
            if actual.as_deref() == Some(a.sha256.as_str()) {
                None
            } else {
                Some(Mismatch {
                    path: a.path.clone(),
                    expected: a.sha256.clone(),
                    actual,
                })
            }
        })
        .collect()
}

/// Read the `artifacts` list of a manifest file.
pub fn read_manifest_artifacts(path: &Path) -> Result<Vec<Artifact>, AppError> {
    #[derive(Deserialize)]
    struct ManifestArtifacts {
        #[serde(default)]
        artifacts: Vec<Artifact>,
    }
    let file = File::open(path)
        .map_err(|e| AppError::new(EXIT_INVALID, format!("Failed to open manifest '{}': {e}", path.display())))?;
    let parsed: ManifestArtifacts = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| AppError::new(EXIT_INVALID, format!("Invalid manifest JSON '{}': {e}", path.display())))?;
    Ok(parsed.artifacts)
}
