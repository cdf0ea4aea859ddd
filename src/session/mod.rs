//! Browser session module
//!
//! The session handle given to test bodies, the driver traits behind it,
//! and the two drivers: agent-browser for real browsers and an in-process
//! page model.

mod agent_browser;
mod driver;
mod handle;
pub mod memory;
mod response;

pub use agent_browser::{AgentBrowserDriver, AgentBrowserFactory};
pub use driver::{BrowserDriver, DriverFactory};
pub use handle::{Session, SessionOptions, TimedSession};
pub use memory::{MemoryDriverFactory, MemoryPage, MemoryStats};
pub use response::CommandResponse;
