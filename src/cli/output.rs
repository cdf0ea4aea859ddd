//! Console output for `run-tests`
//!
//! The report goes to stdout; logs go to stderr through tracing.

use std::process::ExitCode;

use crate::registry::TestRegistry;
use crate::report::RunReport;

/// Process exit status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every selected test passed
    Passed,
    /// At least one test failed, or nothing matched the pattern
    Failed,
    /// The environment prevented the run (driver, target, configuration)
    Infrastructure,
}

impl RunStatus {
    /// Classify a finished run
    pub fn from_report(report: &RunReport) -> Self {
        if report.infrastructure_failures() > 0 {
            RunStatus::Infrastructure
        } else if report.total() == 0 || !report.all_passed() {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        }
    }

    /// Numeric exit code
    pub fn code(&self) -> u8 {
        match self {
            RunStatus::Passed => 0,
            RunStatus::Failed => 1,
            RunStatus::Infrastructure => 2,
        }
    }
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Print the run summary
pub fn print_report(report: &RunReport, driver: &str) {
    println!("\nRunning {} test(s) with {}\n", report.total(), driver);

    if report.total() == 0 {
        println!("No tests matched.");
        return;
    }

    println!("{}", report.summary());
}

/// Print the names of the tests matching `pattern`
pub fn print_test_list(registry: &TestRegistry, pattern: Option<&str>) {
    let mut count = 0;
    for test in registry.matching(pattern) {
        match test.timeout() {
            Some(timeout) => println!("  {} (timeout {} ms)", test.name(), timeout.as_millis()),
            None => println!("  {}", test.name()),
        }
        count += 1;
    }
    println!("\n{} test(s)", count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, Outcome};
    use crate::report::TestRecord;
    use std::time::Duration;

    fn report_with(outcomes: &[Outcome]) -> RunReport {
        let mut report = RunReport::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            report.push(TestRecord::new(
                format!("t{}", i),
                outcome,
                Duration::from_millis(1),
                0,
            ));
        }
        report
    }

    fn failed(kind: ErrorKind) -> Outcome {
        Outcome::Failed {
            kind,
            message: "x".to_string(),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            RunStatus::from_report(&report_with(&[Outcome::Passed])).code(),
            0
        );
        assert_eq!(
            RunStatus::from_report(&report_with(&[Outcome::Passed, failed(ErrorKind::Assertion)]))
                .code(),
            1
        );
        assert_eq!(
            RunStatus::from_report(&report_with(&[failed(ErrorKind::Timeout)])).code(),
            1
        );
        assert_eq!(
            RunStatus::from_report(&report_with(&[Outcome::Passed, failed(ErrorKind::Setup)]))
                .code(),
            2
        );
    }

    #[test]
    fn test_environment_failures_are_infrastructure() {
        for kind in [ErrorKind::Navigation, ErrorKind::ElementNotFound, ErrorKind::Driver] {
            assert_eq!(
                RunStatus::from_report(&report_with(&[Outcome::Passed, failed(kind)])),
                RunStatus::Infrastructure
            );
        }
    }

    #[test]
    fn test_empty_run_is_a_failure() {
        assert_eq!(RunStatus::from_report(&RunReport::new()), RunStatus::Failed);
    }
}
