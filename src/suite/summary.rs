//! Human-readable run summary (`output-summary.md` / `.html`).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat};
use ignore::WalkBuilder;

use crate::error::AppError;
use crate::io::write_text;
use crate::suite::artifacts::{ALLOWED_ROOTS, sha256_file};
use crate::suite::junit::parse_junit;
use crate::suite::manifest::SuiteManifest;

/// Files listed per allowed root.
pub const MAX_LISTED_FILES: usize = 200;
/// Keys shown from each JSON summary.
pub const MAX_JSON_KEYS: usize = 10;

const KEY_SUMMARIES: [&str; 4] = [
    "agent_out/reports/redshift_medians.json",
    "agent_out/reports/redshift_paired_stats.json",
    "agent_out/reports/redshift_cis.json",
    "reports/{run_id}/pytest_summary.json",
];

/// Render the markdown summary of a finished run.
pub fn render_markdown(root: &Path, manifest: &SuiteManifest, generated: DateTime<Local>) -> String {
    let run_id = &manifest.run_id;
    let mut out = String::new();

    out.push_str(&format!("# SSZ Suite Summary: {run_id}\n\n"));
    out.push_str(&format!(
        "Generated: {}\n\n",
        generated.to_rfc3339_opts(SecondsFormat::Secs, false)
    ));

    out.push_str("## Suite Status\n\n");
    out.push_str(&format!("- OK: {}\n", manifest.ok_count()));
    out.push_str(&format!("- Fail: {}\n", manifest.fail_count()));
    if manifest.skipped_count() > 0 {
        out.push_str(&format!("- Skipped: {}\n", manifest.skipped_count()));
    }
    out.push_str(&format!("- Total runtime: {:.2}s\n", manifest.duration_s));
    out.push_str(&format!("- Mode: {}\n", manifest.mode));
    if manifest.interrupted {
        out.push_str("- Interrupted: yes\n");
    }
    out.push_str(&format!("- Suite log: `{}`\n\n", manifest.log));

    out.push_str("## Steps\n\n");
    if manifest.steps.is_empty() {
        out.push_str("No steps were run.\n\n");
    } else {
        out.push_str("| Step | Status | Duration (s) | Log | Error |\n");
        out.push_str("|---|---|---:|---|---|\n");
        for step in &manifest.steps {
            let log_rel = format!("logs/{}.log", step.name);
            let log = if root.join("reports").join(run_id).join(&log_rel).is_file() {
                format!("[log]({log_rel})")
            } else {
                "-".to_string()
            };
            out.push_str(&format!(
                "| {} | {} | {:.3} | {} | {} |\n",
                step.name,
                match (step.ok, step.skipped) {
                    (true, _) => "OK",
                    (false, true) => "SKIPPED",
                    (false, false) => "FAIL",
                },
                step.dt_s,
                log,
                step.error.as_deref().map(table_cell).unwrap_or_default()
            ));
        }
        out.push('\n');
    }

    out.push_str("## Tests (JUnit)\n\n");
    match parse_junit(&root.join(format!("reports/{run_id}/pytest_results.xml"))) {
        Some(j) => out.push_str(&format!(
            "- Total: {}\n- Passed: {}\n- Failed: {}\n- Skipped: {}\n- Duration: {:.2}s\n\n",
            j.total, j.passed, j.failed, j.skipped, j.duration
        )),
        None => out.push_str("No JUnit XML found.\n\n"),
    }

    out.push_str("## Key Summaries\n\n");
    let mut any_summary = false;
    for template in KEY_SUMMARIES {
        let rel = template.replace("{run_id}", run_id);
        if let Some(excerpt) = json_excerpt(&root.join(&rel)) {
            any_summary = true;
            out.push_str(&format!("### {rel}\n\n```json\n{excerpt}\n```\n\n"));
        }
    }
    if !any_summary {
        out.push_str("No JSON summaries found.\n\n");
    }

    out.push_str("## Artifacts\n");
    for dir in ALLOWED_ROOTS {
        let files = list_files(root, dir);
        out.push_str(&format!("\n### {dir}/ ({} files)\n\n", files.len()));
        if files.is_empty() {
            continue;
        }
        out.push_str("| File | Size (bytes) | SHA-256 |\n");
        out.push_str("|---|---:|---|\n");
        for (rel, abs) in files.iter().take(MAX_LISTED_FILES) {
            let size = std::fs::metadata(abs).map(|m| m.len()).unwrap_or(0);
            let sha = sha256_file(abs).unwrap_or_else(|_| "-".to_string());
            out.push_str(&format!("| {rel} | {size} | `{sha}` |\n"));
        }
        if files.len() > MAX_LISTED_FILES {
            out.push_str(&format!("\n... {} more not shown\n", files.len() - MAX_LISTED_FILES));
        }
    }

    out
}

/// The markdown, escaped, inside a minimal HTML page.
pub fn render_html(title: &str, markdown: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<pre>\n{}</pre>\n</body>\n</html>\n",
        escape_html(title),
        escape_html(markdown)
    )
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Write both summary files; returns the markdown path.
pub fn write_summary(root: &Path, manifest: &SuiteManifest) -> Result<PathBuf, AppError> {
    let dir = root.join("reports").join(&manifest.run_id);
    let markdown = render_markdown(root, manifest, Local::now());
    let md_path = dir.join("output-summary.md");
    write_text(&md_path, &markdown)?;
    let title = format!("SSZ Suite Summary: {}", manifest.run_id);
    write_text(&dir.join("output-summary.html"), &render_html(&title, &markdown))?;
    Ok(md_path)
}

fn table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// First keys of a JSON object, pretty-printed; `None` if unreadable.
fn json_excerpt(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&text).ok()?;
    let excerpt = match value {
        serde_json::Value::Object(map) => {
            serde_json::Value::Object(map.into_iter().take(MAX_JSON_KEYS).collect())
        }
        other => other,
    };
    serde_json::to_string_pretty(&excerpt).ok()
}

/// Files under `root/dir` as (`dir/...` relative path, absolute path), sorted.
fn list_files(root: &Path, dir: &str) -> Vec<(String, PathBuf)> {
    let base = root.join(dir);
    if !base.is_dir() {
        return Vec::new();
    }
    let mut builder = WalkBuilder::new(&base);
    builder.standard_filters(false);
    builder.hidden(false);

    let mut files: Vec<(String, PathBuf)> = builder
        .build()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap_or(e.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            (rel, e.into_path())
        })
        .collect();
    files.sort();
    files
}
