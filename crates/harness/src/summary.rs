//! Parsing of the `N failures, M errors` summary line printed by the page test framework

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9]+) failures, ([0-9]+) errors").expect("summary pattern is valid")
});

/// Failure and error counts scraped from runner output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub failures: u64,
    pub errors: u64,
}

impl Summary {
    pub fn failure_count(&self) -> u64 {
        self.failures.saturating_add(self.errors)
    }
}

/// Find the first summary line in `output`.
///
/// Returns `None` when no summary is present or a count does not fit in a `u64`.
pub fn parse_summary(output: &str) -> Option<Summary> {
    let caps = SUMMARY_RE.captures(output)?;
    let failures = caps[1].parse().ok()?;
    let errors = caps[2].parse().ok()?;
    Some(Summary { failures, errors })
}

/// Message-file text for a failure count, `None` when nothing failed.
pub fn failure_message(count: u64) -> Option<String> {
    match count {
        0 => None,
        1 => Some("A test failed!".to_string()),
        n => Some(format!("{} tests failed!", n)),
    }
}
