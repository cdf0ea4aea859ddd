//! In-process driver backed by a scripted page model
//!
//! Serves pages from a route table instead of a real browser. Every launch
//! gets fresh copies of the routed pages, so sessions never share state.
//! Used for dry runs of the built-in suite and for testing test bodies
//! without a browser.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::core::{Result, WebcheckError};
use crate::session::driver::{BrowserDriver, DriverFactory};

/// Reaction to a key press on a page
pub type KeyHandler = Arc<dyn Fn(&mut MemoryPage) + Send + Sync>;

/// Builds a fresh page for every navigation
pub type PageBuilder = Arc<dyn Fn() -> MemoryPage + Send + Sync>;

/// An element in the page model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryElement {
    /// Text content
    pub text: String,
    /// Current input value
    pub value: String,
}

#[derive(Clone)]
struct KeyBinding {
    selector: String,
    key: String,
    handler: KeyHandler,
}

/// A page: elements keyed by the selector that matches them
///
/// Selectors are matched literally; a selector matches exactly the
/// elements registered under it.
#[derive(Clone, Default)]
pub struct MemoryPage {
    elements: BTreeMap<String, Vec<MemoryElement>>,
    bindings: Vec<KeyBinding>,
    focused: Option<String>,
}

impl std::fmt::Debug for MemoryPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPage")
            .field("elements", &self.elements)
            .field("bindings", &self.bindings.len())
            .field("focused", &self.focused)
            .finish()
    }
}

impl MemoryPage {
    /// Create an empty page
    pub fn new() -> Self {
        Self::default()
    }

    /// The TodoMVC app: Enter in `.new-todo` appends its trimmed value to
    /// `.todo-list li` and clears the input
    pub fn todomvc() -> Self {
        Self::new()
            .element(".new-todo", "")
            .on_key(".new-todo", "Enter", |page| {
                let value = page.take_value(".new-todo");
                let title = value.trim();
                if !title.is_empty() {
                    page.append(".todo-list li", title);
                }
            })
    }

    /// Add an element matched by `selector`
    pub fn element(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.append(selector, text);
        self
    }

    /// React to `key` while `selector` is focused
    pub fn on_key<F>(
        mut self,
        selector: impl Into<String>,
        key: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut MemoryPage) + Send + Sync + 'static,
    {
        self.bindings.push(KeyBinding {
            selector: selector.into(),
            key: key.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Append an element matched by `selector`
    pub fn append(&mut self, selector: impl Into<String>, text: impl Into<String>) {
        self.elements
            .entry(selector.into())
            .or_default()
            .push(MemoryElement {
                text: text.into(),
                value: String::new(),
            });
    }

    /// Elements matched by `selector`
    pub fn matches(&self, selector: &str) -> &[MemoryElement] {
        self.elements
            .get(selector)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Text content of the elements matched by `selector`
    pub fn texts(&self, selector: &str) -> Vec<String> {
        self.matches(selector)
            .iter()
            .map(|el| el.text.clone())
            .collect()
    }

    /// Value of the first element matched by `selector`
    pub fn value(&self, selector: &str) -> Option<&str> {
        self.matches(selector).first().map(|el| el.value.as_str())
    }

    /// Clear the first matched element's value and return what it held
    pub fn take_value(&mut self, selector: &str) -> String {
        self.elements
            .get_mut(selector)
            .and_then(|els| els.first_mut())
            .map(|el| std::mem::take(&mut el.value))
            .unwrap_or_default()
    }

    /// Selector of the focused element
    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    fn fill(&mut self, selector: &str, text: &str) -> Result<()> {
        let elements = self
            .elements
            .get_mut(selector)
            .filter(|els| !els.is_empty())
            .ok_or_else(|| WebcheckError::element_not_found(selector))?;

        if elements.len() > 1 {
            return Err(WebcheckError::AmbiguousSelector {
                selector: selector.to_string(),
                count: elements.len(),
            });
        }

        elements[0].value = text.to_string();
        self.focused = Some(selector.to_string());
        Ok(())
    }

    fn press(&mut self, key: &str) {
        let Some(focused) = self.focused.clone() else {
            return;
        };

        let handlers: Vec<KeyHandler> = self
            .bindings
            .iter()
            .filter(|b| b.selector == focused && b.key == key)
            .map(|b| Arc::clone(&b.handler))
            .collect();

        for handler in handlers {
            handler(self);
        }
    }
}

/// Lifecycle counters shared by a factory and all its drivers
#[derive(Debug, Default)]
struct Counters {
    launched: AtomicUsize,
    closed: AtomicUsize,
    aborted: AtomicUsize,
}

/// Snapshot of driver lifecycle events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub launched: usize,
    pub closed: usize,
    pub aborted: usize,
}

/// Factory for [`MemoryDriver`] sessions
#[derive(Clone, Default)]
pub struct MemoryDriverFactory {
    routes: HashMap<String, PageBuilder>,
    latency: Duration,
    launch_failure: Option<String>,
    hang_on_close: bool,
    counters: Arc<Counters>,
}

fn route_key(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl MemoryDriverFactory {
    /// Create a factory with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the TodoMVC page at `base_url`
    pub fn todomvc(base_url: &str) -> Self {
        Self::new().route(base_url, MemoryPage::todomvc)
    }

    /// Serve a freshly built page at `url`
    pub fn route<F>(mut self, url: &str, builder: F) -> Self
    where
        F: Fn() -> MemoryPage + Send + Sync + 'static,
    {
        self.routes.insert(route_key(url), Arc::new(builder));
        self
    }

    /// Delay every driver operation
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every launch fail with `reason`
    pub fn failing_launch(mut self, reason: impl Into<String>) -> Self {
        self.launch_failure = Some(reason.into());
        self
    }

    /// Make `close` never complete
    pub fn hanging_close(mut self) -> Self {
        self.hang_on_close = true;
        self
    }

    /// Lifecycle counters across all launched drivers
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            launched: self.counters.launched.load(Ordering::SeqCst),
            closed: self.counters.closed.load(Ordering::SeqCst),
            aborted: self.counters.aborted.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl DriverFactory for MemoryDriverFactory {
    fn name(&self) -> &str {
        "memory"
    }

    async fn launch(&self, session_name: &str) -> Result<Box<dyn BrowserDriver>> {
        if let Some(reason) = &self.launch_failure {
            return Err(WebcheckError::setup(reason.clone()));
        }

        self.counters.launched.fetch_add(1, Ordering::SeqCst);
        debug!(session = session_name, "launched memory driver");

        Ok(Box::new(MemoryDriver {
            routes: self.routes.clone(),
            page: Mutex::new(None),
            latency: self.latency,
            hang_on_close: self.hang_on_close,
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// A single in-process browser instance
pub struct MemoryDriver {
    routes: HashMap<String, PageBuilder>,
    page: Mutex<Option<MemoryPage>>,
    latency: Duration,
    hang_on_close: bool,
    counters: Arc<Counters>,
}

impl MemoryDriver {
    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn with_page<T>(&self, f: impl FnOnce(&mut Option<MemoryPage>) -> T) -> T {
        let mut page = self
            .page
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut page)
    }
}

#[async_trait]
impl BrowserDriver for MemoryDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.delay().await;
        let builder = self
            .routes
            .get(&route_key(url))
            .ok_or_else(|| WebcheckError::navigation(url, "connection refused"))?;
        let fresh = builder();
        self.with_page(|page| *page = Some(fresh));
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.delay().await;
        self.with_page(|page| match page {
            Some(page) => page.fill(selector, text),
            None => Err(WebcheckError::element_not_found(selector)),
        })
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.delay().await;
        self.with_page(|page| {
            if let Some(page) = page {
                page.press(key);
            }
        });
        Ok(())
    }

    async fn query_text(&self, selector: &str) -> Result<Vec<String>> {
        self.delay().await;
        Ok(self.with_page(|page| {
            page.as_ref()
                .map(|p| p.texts(selector))
                .unwrap_or_default()
        }))
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.delay().await;
        Ok(self.with_page(|page| page.as_ref().map_or(0, |p| p.matches(selector).len())))
    }

    async fn close(&self) -> Result<()> {
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
        self.with_page(|page| *page = None);
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn abort(&self) {
        self.with_page(|page| *page = None);
        self.counters.aborted.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_todomvc_appends_on_enter() {
        let mut page = MemoryPage::todomvc();
        page.fill(".new-todo", "  Buy milk ").unwrap();
        assert_eq!(page.focused(), Some(".new-todo"));
        page.press("Enter");
        assert_eq!(page.texts(".todo-list li"), vec!["Buy milk"]);
        assert_eq!(page.value(".new-todo"), Some(""));
    }

    #[test]
    fn test_todomvc_ignores_blank_input() {
        let mut page = MemoryPage::todomvc();
        page.fill(".new-todo", "   ").unwrap();
        page.press("Enter");
        assert!(page.texts(".todo-list li").is_empty());
    }

    #[test]
    fn test_other_keys_do_nothing() {
        let mut page = MemoryPage::todomvc();
        page.fill(".new-todo", "Buy milk").unwrap();
        page.press("Tab");
        assert!(page.texts(".todo-list li").is_empty());
        assert_eq!(page.value(".new-todo"), Some("Buy milk"));
    }

    #[test]
    fn test_route_key_normalizes_trailing_slash() {
        assert_eq!(route_key("http://localhost:3000"), route_key("http://localhost:3000/"));
    }

    #[tokio::test]
    async fn test_unrouted_url_is_unreachable() {
        let factory = MemoryDriverFactory::todomvc("http://localhost:3000");
        let driver = factory.launch("s").await.unwrap();
        let err = driver.navigate("http://localhost:9/").await.unwrap_err();
        assert!(matches!(err, WebcheckError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_each_launch_gets_a_fresh_page() {
        let factory = MemoryDriverFactory::todomvc("http://localhost:3000");

        let first = factory.launch("a").await.unwrap();
        first.navigate("http://localhost:3000/").await.unwrap();
        first.fill(".new-todo", "Buy milk").await.unwrap();
        first.press_key("Enter").await.unwrap();
        assert_eq!(first.query_text(".todo-list li").await.unwrap().len(), 1);

        let second = factory.launch("b").await.unwrap();
        second.navigate("http://localhost:3000/").await.unwrap();
        assert!(second.query_text(".todo-list li").await.unwrap().is_empty());

        first.close().await.unwrap();
        second.abort();
        assert_eq!(
            factory.stats(),
            MemoryStats {
                launched: 2,
                closed: 1,
                aborted: 1
            }
        );
    }
}
