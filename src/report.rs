//! Run report - per-test records and aggregate counts
//!
//! Records are appended by the runner only, in registration order.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{ErrorKind, Outcome, Result, Status};

/// Outcome of one test, as reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Test name
    pub name: String,
    /// Passed or failed
    pub status: Status,
    /// Wall-clock time including session setup and teardown
    pub duration_ms: u64,
    /// Failure classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Number of assertions the body recorded
    #[serde(default)]
    pub assertions: usize,
}

impl TestRecord {
    /// Build a record from an outcome
    pub fn new(
        name: impl Into<String>,
        outcome: &Outcome,
        duration: Duration,
        assertions: usize,
    ) -> Self {
        Self {
            name: name.into(),
            status: outcome.status(),
            duration_ms: duration.as_millis() as u64,
            error_kind: outcome.kind(),
            message: outcome.message().map(str::to_string),
            assertions,
        }
    }

    /// Reconstruct the outcome
    pub fn outcome(&self) -> Outcome {
        match self.status {
            Status::Passed => Outcome::Passed,
            Status::Failed => Outcome::Failed {
                kind: self.error_kind.unwrap_or(ErrorKind::Other),
                message: self.message.clone().unwrap_or_default(),
            },
        }
    }

    /// Whether the test passed
    pub fn is_passed(&self) -> bool {
        self.status == Status::Passed
    }

    /// Whether the session could not be established at all
    pub fn is_setup_failure(&self) -> bool {
        self.error_kind == Some(ErrorKind::Setup)
    }

    /// Whether the failure points at the environment
    pub fn is_infrastructure_failure(&self) -> bool {
        self.error_kind.is_some_and(|k| k.is_infrastructure())
    }
}

/// All records of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    records: Vec<TestRecord>,
    duration_ms: u64,
}

impl RunReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: TestRecord) {
        self.records.push(record);
    }

    pub(crate) fn finish(&mut self, duration: Duration) {
        self.duration_ms = duration.as_millis() as u64;
    }

    /// Records in registration order
    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    /// Record for the named test
    pub fn get(&self, name: &str) -> Option<&TestRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Total run time
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Number of executed tests
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Number of passed tests
    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.is_passed()).count()
    }

    /// Number of failed tests
    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    /// Failures caused by the environment rather than test logic
    pub fn infrastructure_failures(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_infrastructure_failure())
            .count()
    }

    /// Tests whose session could not be started
    pub fn setup_failures(&self) -> usize {
        self.records.iter().filter(|r| r.is_setup_failure()).count()
    }

    /// Whether every executed test passed
    pub fn all_passed(&self) -> bool {
        self.records.iter().all(TestRecord::is_passed)
    }

    /// Human-readable summary
    pub fn summary(&self) -> String {
        let mut output = String::new();

        for record in &self.records {
            let mark = if record.is_passed() { "✓" } else { "✗" };
            let _ = writeln!(
                output,
                "  {} {} ({} ms)",
                mark, record.name, record.duration_ms
            );

            if let Some(message) = &record.message {
                let kind = record.error_kind.unwrap_or(ErrorKind::Other);
                let mut lines = message.lines();
                if let Some(first) = lines.next() {
                    let _ = writeln!(output, "      [{}] {}", kind, first);
                }
                for line in lines {
                    let _ = writeln!(output, "      {}", line);
                }
            }
        }

        let _ = write!(
            output,
            "\n{} passed, {} failed, {} total ({:.2} s)",
            self.passed(),
            self.failed(),
            self.total(),
            self.duration().as_secs_f64()
        );

        if self.infrastructure_failures() > 0 {
            let _ = write!(
                output,
                "\n{} failure(s) caused by the environment",
                self.infrastructure_failures()
            );
        }

        output
    }

    /// One JSON object per test, newline separated
    pub fn to_jsonl(&self) -> Result<String> {
        let mut output = String::new();
        for record in &self.records {
            output.push_str(&serde_json::to_string(record)?);
            output.push('\n');
        }
        Ok(output)
    }

    /// Write the JSON-lines report, creating parent directories
    pub fn write_jsonl(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_jsonl()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> RunReport {
        let mut report = RunReport::new();
        report.push(TestRecord::new(
            "adds a todo",
            &Outcome::Passed,
            Duration::from_millis(120),
            1,
        ));
        report.push(TestRecord::new(
            "opens the app",
            &Outcome::Failed {
                kind: ErrorKind::Navigation,
                message: "Navigation to http://localhost:3000/ failed: refused".to_string(),
            },
            Duration::from_millis(30),
            0,
        ));
        report.push(TestRecord::new(
            "lists todos",
            &Outcome::Failed {
                kind: ErrorKind::Assertion,
                message: "texts differ: expected=[\"a\"] actual=[]\n  length: expected 1, actual 0"
                    .to_string(),
            },
            Duration::from_millis(40),
            1,
        ));
        report.finish(Duration::from_millis(250));
        report
    }

    #[test]
    fn test_counts() {
        let report = sample_report();
        assert_eq!(report.total(), 3);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.infrastructure_failures(), 1);
        assert_eq!(report.setup_failures(), 0);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_summary_shows_kind_and_message() {
        let summary = sample_report().summary();
        assert!(summary.contains("✓ adds a todo (120 ms)"));
        assert!(summary.contains("[navigation] Navigation to http://localhost:3000/"));
        assert!(summary.contains("[assertion] texts differ"));
        assert!(summary.contains("      length: expected 1, actual 0"));
        assert!(summary.contains("1 passed, 2 failed, 3 total"));
    }

    #[test]
    fn test_jsonl_has_one_object_per_test() {
        let jsonl = sample_report().to_jsonl().unwrap();
        let lines: Vec<_> = jsonl.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["status"], "passed");
        assert!(first.get("error_kind").is_none());

        let second: TestRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.error_kind, Some(ErrorKind::Navigation));
        assert_eq!(second.outcome().kind(), Some(ErrorKind::Navigation));
    }

    #[test]
    fn test_write_jsonl_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.jsonl");
        sample_report().write_jsonl(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
