//! Test runner
//!
//! Runs each test against its own freshly launched session, enforces the
//! test deadline, always tears the session down, and collects the
//! outcomes into a [`RunReport`]. A test passes only if its body returns
//! Ok and every assertion it issued passed.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{FutureExt, StreamExt};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::assert::with_assertion_log;
use crate::core::config::DriverKind;
use crate::core::{Config, ErrorKind, Outcome, Result, WebcheckError};
use crate::registry::{TestCase, TestRegistry};
use crate::report::{RunReport, TestRecord};
use crate::session::{
    AgentBrowserFactory, DriverFactory, MemoryDriverFactory, Session, SessionOptions,
};

/// Runner settings derived from [`Config`]
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Origin that relative navigations resolve against
    pub base_url: Url,
    /// Deadline for tests that declare none
    pub default_timeout: Duration,
    /// Default timeout for a single session operation
    pub action_timeout: Duration,
    /// Retry window for text expectations
    pub expect_timeout: Duration,
    /// Grace period before a closing session is force-aborted
    pub teardown_grace: Duration,
    /// Deadline for launching a driver session
    pub launch_timeout: Duration,
    /// Maximum number of concurrently running tests
    pub jobs: usize,
    /// Prefix for driver session names
    pub session_prefix: String,
}

impl RunnerSettings {
    /// Derive settings from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.runner.base_url).map_err(|e| {
            WebcheckError::config(format!(
                "Invalid base URL '{}': {}",
                config.runner.base_url, e
            ))
        })?;

        Ok(Self {
            base_url,
            default_timeout: config.test_timeout(),
            action_timeout: config.action_timeout(),
            expect_timeout: config.expect_timeout(),
            teardown_grace: config.teardown_grace(),
            launch_timeout: config.launch_timeout(),
            jobs: config.runner.jobs.max(1),
            session_prefix: config.browser.session_prefix.clone(),
        })
    }
}

/// Executes registered tests, one isolated session each
pub struct Runner {
    factory: Arc<dyn DriverFactory>,
    settings: RunnerSettings,
}

impl Runner {
    /// Create a runner over an explicit driver factory
    pub fn new(factory: Arc<dyn DriverFactory>, settings: RunnerSettings) -> Self {
        Self { factory, settings }
    }

    /// Create a runner with the driver selected in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = RunnerSettings::from_config(config)?;
        let factory: Arc<dyn DriverFactory> = match config.browser.driver {
            DriverKind::AgentBrowser => Arc::new(AgentBrowserFactory::new(
                &config.browser.binary,
                config.browser.headed,
            )),
            DriverKind::Memory => {
                Arc::new(MemoryDriverFactory::todomvc(settings.base_url.as_str()))
            }
        };
        Ok(Self::new(factory, settings))
    }

    /// Active settings
    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Name of the driver backend
    pub fn driver_name(&self) -> &str {
        self.factory.name()
    }

    /// Run one test and produce exactly one record
    pub async fn run(&self, test: &TestCase) -> TestRecord {
        let started = Instant::now();
        info!(test = %test.name(), "running");

        let (outcome, assertions) = self.execute(test).await;
        let record = TestRecord::new(test.name(), &outcome, started.elapsed(), assertions);

        match &outcome {
            Outcome::Passed => {
                info!(test = %test.name(), duration_ms = record.duration_ms, "passed")
            }
            Outcome::Failed { kind, message } => error!(
                test = %test.name(),
                duration_ms = record.duration_ms,
                kind = %kind,
                "failed: {}",
                message
            ),
        }

        record
    }

    /// Run every test matching `pattern` and collect the report
    ///
    /// A failing test never stops the ones after it. With `jobs > 1` tests
    /// run concurrently but records keep registration order.
    pub async fn run_all(&self, registry: &TestRegistry, pattern: Option<&str>) -> RunReport {
        let started = Instant::now();
        let tests: Vec<&TestCase> = registry.matching(pattern).collect();
        info!(
            tests = tests.len(),
            jobs = self.settings.jobs,
            driver = self.factory.name(),
            "starting run"
        );

        let records: Vec<TestRecord> = if self.settings.jobs <= 1 {
            let mut records = Vec::with_capacity(tests.len());
            for test in tests {
                records.push(self.run(test).await);
            }
            records
        } else {
            futures::stream::iter(tests)
                .map(|test| self.run(test))
                .buffered(self.settings.jobs)
                .collect()
                .await
        };

        let mut report = RunReport::new();
        for record in records {
            report.push(record);
        }
        report.finish(started.elapsed());

        info!(
            passed = report.passed(),
            failed = report.failed(),
            duration_ms = report.duration().as_millis() as u64,
            "run finished"
        );
        report
    }

    async fn execute(&self, test: &TestCase) -> (Outcome, usize) {
        let session_name = session_name(&self.settings.session_prefix, test.name());

        let session = match self.launch(&session_name).await {
            Ok(session) => session,
            Err(e) => return (Outcome::failed(&e), 0),
        };

        let deadline = test.timeout().unwrap_or(self.settings.default_timeout);
        let body = with_assertion_log(session.assertion_log(), test.invoke(session.clone()));
        let body = AssertUnwindSafe(body).catch_unwind();

        let result = match timeout(deadline, body).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(WebcheckError::Panic(panic_message(panic.as_ref()))),
            Err(_) => Err(WebcheckError::timeout(
                format!("test '{}'", test.name()),
                deadline,
            )),
        };

        if let Err(e) = session.teardown(self.settings.teardown_grace).await {
            warn!(session = %session_name, error = %e, "teardown incomplete");
        }

        let outcome = match result {
            Err(e) => Outcome::failed(&e),
            Ok(()) => match session.first_failed_assertion() {
                Some(failed) => Outcome::failed(&WebcheckError::Assertion(failed.to_error())),
                None => Outcome::Passed,
            },
        };

        (outcome, session.assertions().len())
    }

    async fn launch(&self, session_name: &str) -> Result<Session> {
        debug!(session = %session_name, driver = self.factory.name(), "launching session");

        let launch = self.factory.launch(session_name);
        let driver = match timeout(self.settings.launch_timeout, launch).await {
            Ok(Ok(driver)) => driver,
            Ok(Err(e)) if e.kind() == ErrorKind::Setup => return Err(e),
            Ok(Err(e)) => return Err(WebcheckError::setup(e.to_string())),
            Err(_) => {
                return Err(WebcheckError::setup(format!(
                    "{} did not start within {} ms",
                    self.factory.name(),
                    self.settings.launch_timeout.as_millis()
                )))
            }
        };

        Ok(Session::new(
            session_name,
            driver,
            SessionOptions {
                base_url: self.settings.base_url.clone(),
                action_timeout: self.settings.action_timeout,
                expect_timeout: self.settings.expect_timeout,
            },
        ))
    }
}

/// Probe the target over HTTP before running anything
///
/// Any response below 500 counts as reachable.
pub async fn preflight(base_url: &Url, within: Duration) -> Result<()> {
    let client = reqwest::Client::builder().timeout(within).build()?;

    let response = client.get(base_url.clone()).send().await.map_err(|e| {
        WebcheckError::setup(format!("{} is unreachable: {}", base_url, e))
    })?;

    if response.status().is_server_error() {
        return Err(WebcheckError::setup(format!(
            "{} answered {}",
            base_url,
            response.status()
        )));
    }

    debug!(url = %base_url, status = %response.status(), "preflight ok");
    Ok(())
}

/// Unique driver session name for one test execution
fn session_name(prefix: &str, test_name: &str) -> String {
    let slug: String = test_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let slug: String = slug.chars().take(40).collect();
    format!("{}-{}-{:08x}", prefix, slug, rand::random::<u32>())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_names_are_unique_slugs() {
        let a = session_name("webcheck", "Adds a todo!");
        let b = session_name("webcheck", "Adds a todo!");
        assert!(a.starts_with("webcheck-adds-a-todo-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.runner.jobs = 0;
        config.runner.timeout_ms = 1200;
        let settings = RunnerSettings::from_config(&config).unwrap();
        assert_eq!(settings.jobs, 1);
        assert_eq!(settings.default_timeout, Duration::from_millis(1200));
        assert_eq!(settings.base_url.as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_memory_driver_selected_from_config() {
        let mut config = Config::default();
        config.browser.driver = DriverKind::Memory;
        let runner = Runner::from_config(&config).unwrap();
        assert_eq!(runner.driver_name(), "memory");
    }

    #[tokio::test]
    async fn test_preflight_unreachable_target() {
        // Bind and release a port so nothing is listening on it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let err = preflight(&url, Duration::from_secs(2)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Setup);
    }
}
