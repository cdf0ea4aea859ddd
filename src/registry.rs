//! Test registry - collects named test cases
//!
//! Tests are registered explicitly and kept in registration order, which is
//! also the order the runner reports them in.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::core::{Result, WebcheckError};
use crate::session::Session;

/// A test body: receives its session and resolves to pass or error
pub type TestBody = Arc<dyn Fn(Session) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A named unit of work with an optional deadline
#[derive(Clone)]
pub struct TestCase {
    name: String,
    body: TestBody,
    timeout: Option<Duration>,
}

impl TestCase {
    /// Create a test case from an async function
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(move |session| body(session).boxed()),
            timeout: None,
        }
    }

    /// Set the deadline for this test
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Test name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared deadline, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start the body against `session`
    pub fn invoke(&self, session: Session) -> BoxFuture<'static, Result<()>> {
        (self.body)(session)
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Registry of test cases, in registration order
#[derive(Debug, Default)]
pub struct TestRegistry {
    tests: Vec<TestCase>,
    names: HashSet<String>,
}

impl TestRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test using the runner's default timeout
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, body: F) -> Result<()>
    where
        F: Fn(Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add(TestCase::new(name, body))
    }

    /// Register a test with its own deadline
    pub fn register_with_timeout<F, Fut>(
        &mut self,
        name: impl Into<String>,
        timeout: Duration,
        body: F,
    ) -> Result<()>
    where
        F: Fn(Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add(TestCase::new(name, body).with_timeout(timeout))
    }

    /// Add a prepared test case
    ///
    /// Fails with [`WebcheckError::DuplicateName`] if the name is taken.
    pub fn add(&mut self, test: TestCase) -> Result<()> {
        if !self.names.insert(test.name.clone()) {
            return Err(WebcheckError::DuplicateName(test.name));
        }
        self.tests.push(test);
        Ok(())
    }

    /// All tests in registration order; the iterator can be cloned to restart
    pub fn all(&self) -> std::slice::Iter<'_, TestCase> {
        self.tests.iter()
    }

    /// Tests whose name contains `pattern`, in registration order
    pub fn matching<'a>(
        &'a self,
        pattern: Option<&'a str>,
    ) -> impl Iterator<Item = &'a TestCase> + Clone + 'a {
        self.tests
            .iter()
            .filter(move |t| pattern.map_or(true, |p| t.name.contains(p)))
    }

    /// Look up a test by exact name
    pub fn get(&self, name: &str) -> Option<&TestCase> {
        self.tests.iter().find(|t| t.name == name)
    }

    /// Number of registered tests
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(names: &[&str]) -> TestRegistry {
        let mut registry = TestRegistry::new();
        for name in names {
            registry.register(*name, |_session| async { Ok(()) }).unwrap();
        }
        registry
    }

    #[test]
    fn test_registration_order_is_kept() {
        let registry = registry_with(&["c", "a", "b"]);
        let names: Vec<_> = registry.all().map(TestCase::name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_all_is_restartable() {
        let registry = registry_with(&["one", "two"]);
        let iter = registry.all();
        assert_eq!(iter.clone().count(), 2);
        assert_eq!(iter.count(), 2);
        assert_eq!(registry.all().count(), 2);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = registry_with(&["adds a todo"]);
        let err = registry
            .register("adds a todo", |_session| async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, WebcheckError::DuplicateName(ref n) if n == "adds a todo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_matching_filters_by_substring() {
        let registry = registry_with(&["adds a todo", "removes a todo", "edits title"]);
        let names: Vec<_> = registry
            .matching(Some("todo"))
            .map(TestCase::name)
            .collect();
        assert_eq!(names, vec!["adds a todo", "removes a todo"]);
        assert_eq!(registry.matching(None).count(), 3);
        assert_eq!(registry.matching(Some("nothing")).count(), 0);
    }

    #[test]
    fn test_timeout_is_stored() {
        let mut registry = TestRegistry::new();
        registry
            .register_with_timeout("slow", Duration::from_secs(2), |_session| async {
                Ok(())
            })
            .unwrap();
        assert_eq!(
            registry.get("slow").unwrap().timeout(),
            Some(Duration::from_secs(2))
        );
        assert!(registry.get("fast").is_none());
    }
}
