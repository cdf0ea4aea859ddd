//! Session handle exposed to test bodies
//!
//! Wraps a [`BrowserDriver`] with URL resolution, per-operation timeouts,
//! strict single-element input, and the assertion log the runner reads
//! back after the body returns.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use crate::assert::{push_to_log, AssertionLog, AssertionResult, LocatorExpectation};
use crate::core::{Result, WebcheckError};
use crate::session::driver::BrowserDriver;

/// Settings applied to every session the runner creates
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Origin that relative URLs resolve against
    pub base_url: Url,
    /// Default timeout for a single operation
    pub action_timeout: Duration,
    /// Retry window for text expectations
    pub expect_timeout: Duration,
}

/// An isolated browser session bound to one test
///
/// Clones share the same underlying connection, so a test body can take
/// the session by value while the runner keeps its own handle for teardown.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    name: String,
    driver: Box<dyn BrowserDriver>,
    options: SessionOptions,
    closed: AtomicBool,
    assertions: AssertionLog,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        // Dropped without teardown, e.g. the run itself was cancelled
        if !self.closed.swap(true, Ordering::SeqCst) {
            warn!(session = %self.name, "session dropped while open, aborting driver");
            self.driver.abort();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.inner.name)
            .field("base_url", &self.inner.options.base_url.as_str())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Session {
    /// Wrap a freshly launched driver
    pub fn new(
        name: impl Into<String>,
        driver: Box<dyn BrowserDriver>,
        options: SessionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                name: name.into(),
                driver,
                options,
                closed: AtomicBool::new(false),
                assertions: AssertionLog::default(),
            }),
        }
    }

    /// Driver session name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Origin that relative URLs resolve against
    pub fn base_url(&self) -> &Url {
        &self.inner.options.base_url
    }

    /// Retry window used by [`Session::expect_text`]
    pub fn expect_timeout(&self) -> Duration {
        self.inner.options.expect_timeout
    }

    /// Whether the session has been torn down
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Resolve a possibly relative URL against the base URL
    pub fn resolve_url(&self, url: &str) -> Result<Url> {
        self.inner
            .options
            .base_url
            .join(url)
            .map_err(|e| WebcheckError::navigation(url, format!("invalid URL: {}", e)))
    }

    /// Use a different timeout for the next operations
    pub fn with_timeout(&self, timeout: Duration) -> TimedSession<'_> {
        TimedSession {
            session: self,
            timeout,
        }
    }

    fn timed(&self) -> TimedSession<'_> {
        self.with_timeout(self.inner.options.action_timeout)
    }

    /// Navigate to `url`, relative to the base URL
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.timed().navigate(url).await
    }

    /// Fill the single element matching `selector` with `text`
    pub async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.timed().fill(selector, text).await
    }

    /// Press a key on the focused element
    pub async fn press_key(&self, key: &str) -> Result<()> {
        self.timed().press_key(key).await
    }

    /// Text of every element matching `selector`; empty when none match
    pub async fn query_text(&self, selector: &str) -> Result<Vec<String>> {
        self.timed().query_text(selector).await
    }

    /// Number of elements matching `selector`
    pub async fn count(&self, selector: &str) -> Result<usize> {
        self.timed().count(selector).await
    }

    /// Start a retrying text expectation on `selector`
    pub fn expect_text(&self, selector: impl Into<String>) -> LocatorExpectation<'_> {
        LocatorExpectation::new(self, selector.into())
    }

    /// Record an assertion result, failing if it did not pass
    pub(crate) fn record(&self, result: AssertionResult) -> Result<()> {
        if !result.passed {
            debug!(session = %self.inner.name, message = %result.message, "assertion failed");
        }
        let outcome = result.to_result();
        push_to_log(&self.inner.assertions, result);
        outcome
    }

    /// Log that value assertions issued by this session's test are written to
    pub fn assertion_log(&self) -> AssertionLog {
        Arc::clone(&self.inner.assertions)
    }

    /// All assertion results recorded so far
    pub fn assertions(&self) -> Vec<AssertionResult> {
        self.inner
            .assertions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// First recorded assertion that did not pass
    pub fn first_failed_assertion(&self) -> Option<AssertionResult> {
        self.inner
            .assertions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|a| !a.passed)
            .cloned()
    }

    /// Close the driver, force-aborting it if `grace` elapses first
    ///
    /// Idempotent: only the first call reaches the driver.
    pub async fn teardown(&self, grace: Duration) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        debug!(session = %self.inner.name, "closing session");
        match timeout(grace, self.inner.driver.close()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(session = %self.inner.name, error = %e, "close failed, aborting driver");
                self.inner.driver.abort();
                Err(e)
            }
            Err(_) => {
                warn!(
                    session = %self.inner.name,
                    grace_ms = grace.as_millis() as u64,
                    "close did not finish, aborting driver"
                );
                self.inner.driver.abort();
                Err(WebcheckError::timeout("close session", grace))
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(WebcheckError::driver(format!(
                "session '{}' closed",
                self.inner.name
            )));
        }
        Ok(())
    }

    fn driver(&self) -> &dyn BrowserDriver {
        self.inner.driver.as_ref()
    }
}

/// Session operations bound to an explicit timeout
pub struct TimedSession<'a> {
    session: &'a Session,
    timeout: Duration,
}

impl TimedSession<'_> {
    async fn bounded<T, F>(&self, operation: String, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.session.ensure_open()?;
        match timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(WebcheckError::timeout(operation, self.timeout)),
        }
    }

    /// Navigate to `url`, relative to the base URL
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.session.ensure_open()?;
        let target = self.session.resolve_url(url)?;
        debug!(session = %self.session.name(), url = %target, "navigate");

        match timeout(self.timeout, self.session.driver().navigate(target.as_str())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(WebcheckError::Navigation { url, reason })) => {
                Err(WebcheckError::Navigation { url, reason })
            }
            Ok(Err(e)) if e.kind().is_infrastructure() => {
                Err(WebcheckError::navigation(target.as_str(), e.to_string()))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(WebcheckError::navigation(
                target.as_str(),
                format!("no response within {} ms", self.timeout.as_millis()),
            )),
        }
    }

    /// Fill the single element matching `selector` with `text`
    pub async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        debug!(session = %self.session.name(), selector, "fill");
        let driver = self.session.driver();
        self.bounded(format!("fill '{}'", selector), async {
            match driver.count(selector).await? {
                0 => Err(WebcheckError::element_not_found(selector)),
                1 => driver.fill(selector, text).await,
                count => Err(WebcheckError::AmbiguousSelector {
                    selector: selector.to_string(),
                    count,
                }),
            }
        })
        .await
    }

    /// Press a key on the focused element
    pub async fn press_key(&self, key: &str) -> Result<()> {
        debug!(session = %self.session.name(), key, "press");
        self.bounded(
            format!("press '{}'", key),
            self.session.driver().press_key(key),
        )
        .await
    }

    /// Text of every element matching `selector`; empty when none match
    pub async fn query_text(&self, selector: &str) -> Result<Vec<String>> {
        self.bounded(
            format!("query text of '{}'", selector),
            self.session.driver().query_text(selector),
        )
        .await
    }

    /// Number of elements matching `selector`
    pub async fn count(&self, selector: &str) -> Result<usize> {
        self.bounded(
            format!("count '{}'", selector),
            self.session.driver().count(selector),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert::{expect, with_assertion_log};
    use crate::session::memory::{MemoryDriverFactory, MemoryPage};
    use crate::session::DriverFactory;

    async fn todo_session() -> Session {
        let factory = MemoryDriverFactory::new().route("http://app.test/", MemoryPage::todomvc);
        let driver = factory.launch("unit").await.unwrap();
        Session::new(
            "unit",
            driver,
            SessionOptions {
                base_url: Url::parse("http://app.test").unwrap(),
                action_timeout: Duration::from_millis(500),
                expect_timeout: Duration::from_millis(200),
            },
        )
    }

    #[tokio::test]
    async fn test_relative_navigation_resolves_against_base() {
        let session = todo_session().await;
        assert_eq!(
            session.resolve_url("/").unwrap().as_str(),
            "http://app.test/"
        );
        session.navigate("/").await.unwrap();
    }

    #[tokio::test]
    async fn test_fill_missing_element() {
        let session = todo_session().await;
        session.navigate("/").await.unwrap();
        let err = session.fill(".missing", "x").await.unwrap_err();
        assert!(matches!(err, WebcheckError::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_fill_ambiguous_selector_fails() {
        let factory = MemoryDriverFactory::new().route("http://app.test/", || {
            MemoryPage::new().element("input", "").element("input", "")
        });
        let session = Session::new(
            "unit",
            factory.launch("unit").await.unwrap(),
            SessionOptions {
                base_url: Url::parse("http://app.test").unwrap(),
                action_timeout: Duration::from_millis(500),
                expect_timeout: Duration::from_millis(200),
            },
        );
        session.navigate("/").await.unwrap();
        let err = session.fill("input", "x").await.unwrap_err();
        assert!(matches!(
            err,
            WebcheckError::AmbiguousSelector { count: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_query_text_no_match_is_empty() {
        let session = todo_session().await;
        session.navigate("/").await.unwrap();
        assert!(session.query_text(".nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_issued_assertions_reach_the_session() {
        let session = todo_session().await;
        with_assertion_log(session.assertion_log(), async {
            expect(1).check_equal(1);
            expect(1).check_equal(2);
        })
        .await;
        assert_eq!(session.assertions().len(), 2);
        assert!(session.first_failed_assertion().is_some());
    }

    #[tokio::test]
    async fn test_dropping_open_session_aborts_driver() {
        let factory = MemoryDriverFactory::todomvc("http://app.test/");
        let session = Session::new(
            "unit",
            factory.launch("unit").await.unwrap(),
            SessionOptions {
                base_url: Url::parse("http://app.test").unwrap(),
                action_timeout: Duration::from_millis(500),
                expect_timeout: Duration::from_millis(200),
            },
        );
        let clone = session.clone();
        drop(session);
        assert_eq!(factory.stats().aborted, 0);
        drop(clone);
        assert_eq!(factory.stats().aborted, 1);
    }

    #[tokio::test]
    async fn test_drop_after_teardown_does_not_abort() {
        let factory = MemoryDriverFactory::todomvc("http://app.test/");
        let session = Session::new(
            "unit",
            factory.launch("unit").await.unwrap(),
            SessionOptions {
                base_url: Url::parse("http://app.test").unwrap(),
                action_timeout: Duration::from_millis(500),
                expect_timeout: Duration::from_millis(200),
            },
        );
        session.teardown(Duration::from_millis(100)).await.unwrap();
        drop(session);
        assert_eq!(factory.stats().closed, 1);
        assert_eq!(factory.stats().aborted, 0);
    }

    #[tokio::test]
    async fn test_operations_fail_after_teardown() {
        let session = todo_session().await;
        session.teardown(Duration::from_millis(100)).await.unwrap();
        assert!(session.is_closed());
        let err = session.navigate("/").await.unwrap_err();
        assert!(err.to_string().contains("closed"));
        // second teardown is a no-op
        session.teardown(Duration::from_millis(100)).await.unwrap();
    }
}
