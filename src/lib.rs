//! webcheck - browser-automation test runner
//!
//! Registers end-to-end tests explicitly, runs each against its own freshly
//! launched browser session, and reports one outcome per test.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **Registry**: Named test cases in registration order
//! - **Runner**: Session-per-test execution with deadlines and teardown
//! - **Assert**: Expectations producing assertion results
//! - **Session**: Session handle and browser drivers (agent-browser, memory)
//! - **Report**: Per-test records, summary, JSON lines
//! - **CLI**: Console output and exit status for `run-tests`
//!
//! # Usage
//!
//! ```rust,no_run
//! use webcheck::{Config, Runner, TestRegistry};
//!
//! #[tokio::main]
//! async fn main() -> webcheck::Result<()> {
//!     let mut registry = TestRegistry::new();
//!     registry.register("adds a todo", |page| async move {
//!         page.navigate("/").await?;
//!         page.fill(".new-todo", "Buy milk").await?;
//!         page.press_key("Enter").await?;
//!         page.expect_text(".todo-list li").to_have_text(&["Buy milk"]).await
//!     })?;
//!
//!     let runner = Runner::from_config(&Config::load()?)?;
//!     let report = runner.run_all(&registry, None).await;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod assert;
pub mod cli;
pub mod core;
pub mod registry;
pub mod report;
pub mod runner;
pub mod session;
pub mod suites;

// Re-export commonly used items
pub use assert::{expect, expect_texts, AssertionError, AssertionResult};
pub use core::{Config, ErrorKind, Outcome, Result, Status, WebcheckError};
pub use registry::{TestCase, TestRegistry};
pub use report::{RunReport, TestRecord};
pub use runner::{preflight, Runner, RunnerSettings};
pub use session::Session;
