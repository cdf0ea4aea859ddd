//! Driver abstraction for browser automation backends
//!
//! A driver owns one controlled browser instance. The runner never talks to
//! a driver directly from a test body; it wraps it in a [`Session`].
//!
//! [`Session`]: crate::session::Session

use async_trait::async_trait;

use crate::core::Result;

/// One connection to a controlled browser instance
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Load the given absolute URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Replace the value of the element matching `selector` and focus it
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;

    /// Send a single key event to the focused element
    async fn press_key(&self, key: &str) -> Result<()>;

    /// Text content of every element matching `selector`, in document order
    async fn query_text(&self, selector: &str) -> Result<Vec<String>>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.query_text(selector).await?.len())
    }

    /// Close the browser instance gracefully
    async fn close(&self) -> Result<()>;

    /// Forcefully drop the browser instance without waiting
    fn abort(&self);
}

/// Launches fresh driver instances, one per test
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Start a new isolated browser instance
    async fn launch(&self, session_name: &str) -> Result<Box<dyn BrowserDriver>>;
}
