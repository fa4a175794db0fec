//! Snapshot of recently modified repository files.
//!
//! Recorded at suite start so a run can be traced back to the working-tree
//! state it saw. Transient and output directories are pruned from the walk.

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use ignore::WalkBuilder;
use serde::Serialize;

/// Directory names never descended into.
pub const EXCLUDED_DIRS: [&str; 11] = [
    ".git",
    "target",
    "__pycache__",
    "data",
    "experiments",
    "reports",
    "agent_out",
    "out",
    "vfall_out",
    "models",
    "ci",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    /// Relative to the root, `/`-separated.
    pub path: String,
    pub size: u64,
    pub mtime: String,
    pub in_git: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFiles {
    pub since: String,
    pub time_window_days: u32,
    pub count: usize,
    pub files: Vec<ChangedFile>,
}

/// Files under `root` modified at or after `now - window_days`, sorted by path.
pub fn snapshot(root: &Path, window_days: u32, now: DateTime<Utc>) -> ChangedFiles {
    let since = now - Duration::days(i64::from(window_days));
    let tracked = git_tracked(root);

    let mut builder = WalkBuilder::new(root);
    // The fixed exclusion list is the only filter.
    builder.standard_filters(false);
    builder.hidden(false);
    builder.filter_entry(|entry| {
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        let name = entry.file_name().to_string_lossy();
        !(is_dir && entry.depth() > 0 && EXCLUDED_DIRS.iter().any(|d| *d == name))
    });

    let mut files = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(modified) = meta.modified() else { continue };
        let mtime = DateTime::<Utc>::from(modified);
        if mtime < since {
            continue;
        }

        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(ChangedFile {
            in_git: tracked.contains(&path),
            path,
            size: meta.len(),
            mtime: mtime.to_rfc3339_opts(SecondsFormat::Secs, true),
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    ChangedFiles {
        since: since.to_rfc3339_opts(SecondsFormat::Secs, true),
        time_window_days: window_days,
        count: files.len(),
        files,
    }
}

/// Paths tracked by git; empty when git is unavailable or `root` is not a checkout.
fn git_tracked(root: &Path) -> BTreeSet<String> {
    let output = Command::new("git").args(["ls-files", "-z"]).current_dir(root).output();
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .split('\0')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Ok(out) => {
            tracing::debug!(status = %out.status, "git ls-files failed; in_git will be false");
            BTreeSet::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "git not available; in_git will be false");
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluded_dirs_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("reports/r1")).unwrap();
        std::fs::create_dir_all(root.join("target/debug")).unwrap();
        std::fs::write(root.join("src/lib.rs"), "x").unwrap();
        std::fs::write(root.join("README.md"), "y").unwrap();
        std::fs::write(root.join("reports/r1/out.txt"), "z").unwrap();
        std::fs::write(root.join("target/debug/bin"), "w").unwrap();

        let snap = snapshot(root, 7, Utc::now());
        let paths: Vec<&str> = snap.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/lib.rs"]);
        assert_eq!(snap.count, 2);
        assert!(snap.files.iter().all(|f| !f.in_git));
    }

    #[test]
    fn old_files_fall_outside_the_window() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let future = Utc::now() + Duration::days(30);
        let snap = snapshot(dir.path(), 7, future);
        assert_eq!(snap.count, 0);
    }
}
