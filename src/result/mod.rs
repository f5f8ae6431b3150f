//! Test results and the suite report file.
//!
//! One `TestResult` per executed case, aggregated into a `SuiteReport`
//! with a computed summary and written as pretty JSON. Log lines are
//! scrubbed of ANSI escapes before serialization so the report stays
//! terminal-independent.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The case passed.
    Pass,
    /// A mandatory expectation was violated.
    Failed,
    /// A precondition was not met; the case is conditionally skipped
    /// rather than failed.
    OptionalFailed,
    /// The case could not be executed (preflight or internal error).
    Skipped,
}

/// Result of one executed test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub device_id: String,
    pub operation: String,
    pub request: String,
    pub outcome: Outcome,
    pub response: String,
    pub logs: Vec<String>,
    pub duration_ms: u64,
}

impl TestResult {
    /// Start a result record in the `Skipped` state; the runner upgrades
    /// it as the case progresses.
    pub fn begin(test_id: String, device_id: &str, operation: &str, request: String) -> Self {
        Self {
            test_id,
            device_id: device_id.to_string(),
            operation: operation.to_string(),
            request,
            outcome: Outcome::Skipped,
            response: String::new(),
            logs: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Append a log line.
    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }
}

/// Summary counters for one suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    pub tests_executed: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub tests_optional_failed: usize,
    pub tests_skipped: usize,
    /// True when nothing failed and nothing was skipped.
    pub overall_passed: bool,
}

impl ResultSummary {
    fn compute(results: &[TestResult]) -> Self {
        let count = |wanted: Outcome| results.iter().filter(|r| r.outcome == wanted).count();
        let failed = count(Outcome::Failed);
        let skipped = count(Outcome::Skipped);
        Self {
            tests_executed: results.len(),
            tests_passed: count(Outcome::Pass),
            tests_failed: failed,
            tests_optional_failed: count(Outcome::OptionalFailed),
            tests_skipped: skipped,
            overall_passed: failed == 0 && skipped == 0,
        }
    }
}

/// Structured report for one suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Version of this test tool.
    pub test_version: String,
    pub suite_name: String,
    pub created_at: DateTime<Utc>,
    /// Filtered `device/info` fields for the device under test.
    pub device_info: Value,
    pub result_summary: ResultSummary,
    pub test_result_list: Vec<TestResult>,
}

impl SuiteReport {
    /// Build a report, computing the summary and scrubbing log lines.
    pub fn new(suite_name: impl Into<String>, device_info: Value, mut results: Vec<TestResult>) -> Self {
        for result in &mut results {
            for line in &mut result.logs {
                *line = strip_ansi(line);
            }
            result.response = strip_ansi(&result.response);
        }
        Self {
            test_version: env!("CARGO_PKG_VERSION").to_string(),
            suite_name: suite_name.into(),
            created_at: Utc::now(),
            device_info,
            result_summary: ResultSummary::compute(&results),
            test_result_list: results,
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report to a file, creating parent directories as needed.
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

/// Derive a compact test identifier from `<operation>/<title>`:
/// alphanumeric runs, title-cased, concatenated.
pub fn to_test_id(input: &str) -> String {
    let mut id = String::with_capacity(input.len());
    let mut start_of_word = true;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_alphabetic() {
                if start_of_word {
                    id.push(ch.to_ascii_uppercase());
                } else {
                    id.push(ch.to_ascii_lowercase());
                }
                start_of_word = false;
            } else {
                id.push(ch);
                start_of_word = true;
            }
        } else {
            start_of_word = true;
        }
    }
    id
}

/// Remove ANSI escape sequences from a line.
pub fn strip_ansi(input: &str) -> String {
    // CSI sequences: ESC [ parameters intermediates final.
    static ANSI: OnceLock<Option<Regex>> = OnceLock::new();
    match ANSI.get_or_init(|| Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").ok()) {
        Some(pattern) => pattern.replace_all(input, "").into_owned(),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_with(outcome: Outcome) -> TestResult {
        let mut result = TestResult::begin(
            to_test_id("operations/list/Smoke"),
            "dev-1",
            "operations/list",
            "{}".to_string(),
        );
        result.outcome = outcome;
        result
    }

    #[test]
    fn test_to_test_id() {
        assert_eq!(
            to_test_id("applications/launch/Launch App"),
            "ApplicationsLaunchLaunchApp"
        );
        assert_eq!(to_test_id("input/key-press/KEY_HOME"), "InputKeyPressKeyHome");
        assert_eq!(to_test_id(""), "");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;32m[ PASS ]\x1b[0m"), "[ PASS ]");
        assert_eq!(strip_ansi("plain text"), "plain text");
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result_with(Outcome::Pass),
            result_with(Outcome::Pass),
            result_with(Outcome::Failed),
            result_with(Outcome::OptionalFailed),
        ];
        let summary = ResultSummary::compute(&results);
        assert_eq!(summary.tests_executed, 4);
        assert_eq!(summary.tests_passed, 2);
        assert_eq!(summary.tests_failed, 1);
        assert_eq!(summary.tests_optional_failed, 1);
        assert_eq!(summary.tests_skipped, 0);
        assert!(!summary.overall_passed);
    }

    #[test]
    fn test_overall_passed_ignores_optional_failures() {
        let results = vec![result_with(Outcome::Pass), result_with(Outcome::OptionalFailed)];
        assert!(ResultSummary::compute(&results).overall_passed);
    }

    #[test]
    fn test_skipped_blocks_overall_pass() {
        let results = vec![result_with(Outcome::Pass), result_with(Outcome::Skipped)];
        assert!(!ResultSummary::compute(&results).overall_passed);
    }

    #[test]
    fn test_report_scrubs_logs() {
        let mut result = result_with(Outcome::Pass);
        result.log("\x1b[1;32m[ PASS ]\x1b[0m all good");
        let report = SuiteReport::new("conformance", json!({}), vec![result]);
        assert_eq!(report.test_result_list[0].logs[0], "[ PASS ] all good");
    }

    #[test]
    fn test_outcome_wire_names() {
        assert_eq!(
            serde_json::to_string(&Outcome::OptionalFailed).unwrap(),
            "\"OPTIONAL_FAILED\""
        );
        assert_eq!(serde_json::to_string(&Outcome::Pass).unwrap(), "\"PASS\"");
    }

    #[test]
    fn test_write_and_read_file() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let report = SuiteReport::new("conformance", json!({"model": "X-1"}), vec![result_with(Outcome::Pass)]);

        let path = dir.path().join("reports/conformance.json");
        report.write_to_file(&path).unwrap();

        let loaded: SuiteReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.suite_name, "conformance");
        assert_eq!(loaded.result_summary.tests_passed, 1);
    }
}
