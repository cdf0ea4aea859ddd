//! Assertion engine
//!
//! Assertions produce [`AssertionResult`] values. Every result issued
//! while a test body runs lands in that test's assertion log, which the
//! runner folds into the outcome. `to_equal` also turns a failure into an
//! error for `?`; `check_equal` only records it (a soft assertion).

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};

use crate::core::{Result, WebcheckError};
use crate::session::Session;

/// Polling interval for retrying text expectations
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Assertion results issued by one test, shared with its session
pub type AssertionLog = Arc<Mutex<Vec<AssertionResult>>>;

tokio::task_local! {
    static ISSUED: AssertionLog;
}

/// Run `fut` with every assertion it issues recorded into `log`
pub fn with_assertion_log<F>(log: AssertionLog, fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    ISSUED.scope(log, fut)
}

pub(crate) fn push_to_log(log: &AssertionLog, result: AssertionResult) {
    log.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(result);
}

/// Record `result` in the current test's log, if there is one
fn issue(result: AssertionResult) -> AssertionResult {
    // Outside a runner scope there is nobody to aggregate
    let _ = ISSUED.try_with(|log| push_to_log(log, result.clone()));
    result
}

/// Result of a single assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    /// Whether actual matched expected
    pub passed: bool,
    /// Rendering of the expected value
    pub expected: String,
    /// Rendering of the actual value
    pub actual: String,
    /// What was being checked
    pub message: String,
    /// Element-wise differences, for sequence comparisons
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl AssertionResult {
    /// Convert into an error if the assertion failed
    pub fn to_result(&self) -> Result<()> {
        if self.passed {
            Ok(())
        } else {
            Err(WebcheckError::Assertion(self.to_error()))
        }
    }

    /// The error describing this result
    pub fn to_error(&self) -> AssertionError {
        AssertionError {
            message: self.message.clone(),
            expected: self.expected.clone(),
            actual: self.actual.clone(),
            diff: self.diff.clone(),
        }
    }
}

/// Expected/actual mismatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionError {
    pub message: String,
    pub expected: String,
    pub actual: String,
    pub diff: Option<String>,
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected={} actual={}",
            self.message, self.expected, self.actual
        )?;
        if let Some(diff) = &self.diff {
            write!(f, "\n{}", diff)?;
        }
        Ok(())
    }
}

impl std::error::Error for AssertionError {}

/// Start an expectation on `actual`
pub fn expect<T>(actual: T) -> Expectation<T> {
    Expectation {
        actual,
        message: None,
    }
}

/// Expectation on an arbitrary value
#[derive(Debug, Clone)]
pub struct Expectation<T> {
    actual: T,
    message: Option<String>,
}

impl<T: fmt::Debug> Expectation<T> {
    /// Describe what is being checked
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Compare structurally and record the result without failing
    pub fn check_equal<U>(&self, expected: U) -> AssertionResult
    where
        T: PartialEq<U>,
        U: fmt::Debug,
    {
        issue(self.evaluate(expected))
    }

    fn evaluate<U>(&self, expected: U) -> AssertionResult
    where
        T: PartialEq<U>,
        U: fmt::Debug,
    {
        AssertionResult {
            passed: self.actual == expected,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", self.actual),
            message: self
                .message
                .clone()
                .unwrap_or_else(|| "values differ".to_string()),
            diff: None,
        }
    }

    /// Fail unless actual equals `expected`
    pub fn to_equal<U>(self, expected: U) -> Result<()>
    where
        T: PartialEq<U>,
        U: fmt::Debug,
    {
        self.check_equal(expected).to_result()
    }
}

impl Expectation<bool> {
    /// Fail unless the value is true
    pub fn to_be_true(self) -> Result<()> {
        self.to_equal(true)
    }

    /// Fail unless the value is false
    pub fn to_be_false(self) -> Result<()> {
        self.to_equal(false)
    }
}

/// Start an expectation on an ordered collection of texts
pub fn expect_texts<I, S>(actual: I) -> TextsExpectation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    TextsExpectation {
        actual: actual.into_iter().map(Into::into).collect(),
        message: None,
    }
}

/// Expectation on an ordered collection of texts
#[derive(Debug, Clone)]
pub struct TextsExpectation {
    actual: Vec<String>,
    message: Option<String>,
}

impl TextsExpectation {
    /// Describe what is being checked
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Compare element-wise and record the result without failing
    pub fn check_equal<S: AsRef<str>>(&self, expected: &[S]) -> AssertionResult {
        let mut result = compare_texts(expected, &self.actual);
        if let Some(message) = &self.message {
            result.message = message.clone();
        }
        issue(result)
    }

    /// Fail unless the texts equal `expected`, in order and length
    pub fn to_equal<S: AsRef<str>>(self, expected: &[S]) -> Result<()> {
        self.check_equal(expected).to_result()
    }
}

/// Compare two text sequences element-wise, in order, with exact length
pub fn compare_texts<S: AsRef<str>>(expected: &[S], actual: &[String]) -> AssertionResult {
    let expected: Vec<&str> = expected.iter().map(AsRef::as_ref).collect();
    let passed = expected.len() == actual.len()
        && expected.iter().zip(actual).all(|(e, a)| *e == a.as_str());

    AssertionResult {
        passed,
        expected: format!("{:?}", expected),
        actual: format!("{:?}", actual),
        message: "texts differ".to_string(),
        diff: if passed {
            None
        } else {
            Some(text_diff(&expected, actual))
        },
    }
}

fn text_diff(expected: &[&str], actual: &[String]) -> String {
    let mut lines = Vec::new();

    for i in 0..expected.len().max(actual.len()) {
        let e = expected.get(i).copied();
        let a = actual.get(i).map(String::as_str);
        if e != a {
            lines.push(format!(
                "  [{}] expected {}, actual {}",
                i,
                e.map_or_else(|| "<missing>".to_string(), |s| format!("{:?}", s)),
                a.map_or_else(|| "<missing>".to_string(), |s| format!("{:?}", s)),
            ));
        }
    }

    if expected.len() != actual.len() {
        lines.push(format!(
            "  length: expected {}, actual {}",
            expected.len(),
            actual.len()
        ));
    }

    lines.join("\n")
}

/// Retrying expectation on the elements matching a selector
pub struct LocatorExpectation<'a> {
    session: &'a Session,
    selector: String,
    timeout: Duration,
}

impl<'a> LocatorExpectation<'a> {
    pub(crate) fn new(session: &'a Session, selector: String) -> Self {
        let timeout = session.expect_timeout();
        Self {
            session,
            selector,
            timeout,
        }
    }

    /// Override how long to keep retrying
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait until the matched elements have exactly these texts, in order
    ///
    /// Fails with the last observed texts once the timeout elapses. Only the
    /// final comparison is recorded, not every poll.
    pub async fn to_have_text<S: AsRef<str>>(&self, expected: &[S]) -> Result<()> {
        let message = format!("'{}' to have text", self.selector);
        let result = self
            .poll(|actual: Vec<String>| {
                let mut result = compare_texts(expected, &actual);
                result.message = message.clone();
                result
            })
            .await?;
        self.session.record(result)
    }

    /// Wait until exactly `count` elements match
    pub async fn to_have_count(&self, count: usize) -> Result<()> {
        let message = format!("'{}' to have count", self.selector);
        let result = self
            .poll(|actual: Vec<String>| {
                expect(actual.len())
                    .with_message(message.clone())
                    .evaluate(count)
            })
            .await?;
        self.session.record(result)
    }

    async fn poll<F>(&self, check: F) -> Result<AssertionResult>
    where
        F: Fn(Vec<String>) -> AssertionResult,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            let actual = self.session.query_text(&self.selector).await?;
            let result = check(actual);
            if result.passed || Instant::now() >= deadline {
                return Ok(result);
            }
            sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_equal() {
        assert!(expect(3).to_equal(3).is_ok());
        let err = expect("a").to_equal("b").unwrap_err();
        assert!(matches!(err, WebcheckError::Assertion(_)));
        assert!(err.to_string().contains("expected=\"b\" actual=\"a\""));
    }

    #[test]
    fn test_custom_message() {
        let result = expect(vec![1, 2]).with_message("ids").check_equal(vec![1]);
        assert!(!result.passed);
        assert_eq!(result.message, "ids");
    }

    #[test]
    fn test_bool_helpers() {
        assert!(expect(true).to_be_true().is_ok());
        assert!(expect(true).to_be_false().is_err());
    }

    #[tokio::test]
    async fn test_issued_assertions_are_logged_in_scope() {
        let log = AssertionLog::default();
        with_assertion_log(Arc::clone(&log), async {
            expect(1).check_equal(2);
            let _ = expect_texts(["a"]).to_equal(&["a"]);
        })
        .await;

        // Outside the scope nothing is recorded
        expect(1).check_equal(2);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(!log[0].passed);
        assert!(log[1].passed);
    }

    #[test]
    fn test_texts_match() {
        let result = compare_texts(&["Buy milk"], &["Buy milk".to_string()]);
        assert!(result.passed);
        assert!(result.diff.is_none());
    }

    #[test]
    fn test_texts_length_mismatch_with_matching_prefix() {
        let actual = vec!["a".to_string(), "b".to_string()];
        let result = compare_texts(&["a", "b", "c"], &actual);
        assert!(!result.passed);
        let diff = result.diff.unwrap();
        assert!(diff.contains("[2] expected \"c\", actual <missing>"));
        assert!(diff.contains("length: expected 3, actual 2"));
    }

    #[test]
    fn test_texts_order_matters() {
        let actual = vec!["b".to_string(), "a".to_string()];
        assert!(!compare_texts(&["a", "b"], &actual).passed);
    }

    #[test]
    fn test_empty_actual_renders_as_empty_list() {
        let err = expect_texts(Vec::<String>::new())
            .to_equal(&["Buy milk"])
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("actual=[]"));
        assert!(text.contains("expected=[\"Buy milk\"]"));
    }
}
