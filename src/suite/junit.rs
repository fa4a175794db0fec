//! JUnit XML totals.
//!
//! Only the `<testsuite>` attributes are read; a full XML parser is not needed
//! for four counters and a duration.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SUITE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<testsuite\b([^>]*)>").expect("valid testsuite regex"));

static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*"([^"]*)""#).expect("valid attribute regex"));

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JunitSummary {
    pub total: u64,
    pub passed: u64,
    /// Failures plus errors.
    pub failed: u64,
    pub skipped: u64,
    pub duration: f64,
}

/// Sum the totals of every `<testsuite>` element; `None` if there is none.
pub fn parse_junit_str(xml: &str) -> Option<JunitSummary> {
    let mut found = false;
    let mut summary = JunitSummary::default();
    for tag in SUITE_TAG.captures_iter(xml) {
        found = true;
        let attrs: HashMap<&str, &str> = ATTRIBUTE
            .captures_iter(&tag[1])
            .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
            .collect();
        let count = |key: &str| attrs.get(key).and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(0);

        summary.total += count("tests");
        summary.failed += count("failures") + count("errors");
        summary.skipped += count("skipped");
        summary.duration += attrs
            .get("time")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
    }
    if !found {
        return None;
    }
    summary.passed = summary.total.saturating_sub(summary.failed + summary.skipped);
    Some(summary)
}

/// Read and parse a JUnit file; `None` when missing, unreadable or empty of suites.
pub fn parse_junit(path: &Path) -> Option<JunitSummary> {
    let xml = std::fs::read_to_string(path).ok()?;
    parse_junit_str(&xml)
}
