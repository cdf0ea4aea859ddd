//! Custom error types for webcheck
//!
//! Provides a unified error handling system across all modules, plus the
//! coarse [`ErrorKind`] classification shown in run reports.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assert::AssertionError;

/// Main error type for webcheck operations
#[derive(Error, Debug)]
pub enum WebcheckError {
    /// Expected/actual mismatch raised by the assertion engine
    #[error("Assertion failed: {0}")]
    Assertion(AssertionError),

    /// Navigation target unreachable or too slow
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Selector matched zero elements
    #[error("No element matches selector '{selector}'")]
    ElementNotFound { selector: String },

    /// Selector matched several elements where exactly one is required
    #[error("Selector '{selector}' matched {count} elements, expected exactly one")]
    AmbiguousSelector { selector: String, count: usize },

    /// Deadline exceeded
    #[error("Timed out after {} ms: {operation}", .after.as_millis())]
    Timeout { operation: String, after: Duration },

    /// A test with the same name is already registered
    #[error("Duplicate test name: '{0}'")]
    DuplicateName(String),

    /// Browser driver errors
    #[error("Driver error: {0}")]
    Driver(String),

    /// Driver binary not installed
    #[error("{0} not found. Install with: npm install -g agent-browser && agent-browser install")]
    DriverNotFound(String),

    /// Session could not be established
    #[error("Session setup failed: {0}")]
    Setup(String),

    /// Test body panicked
    #[error("Test panicked: {0}")]
    Panic(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

}

/// Convenience Result type for webcheck operations
pub type Result<T> = std::result::Result<T, WebcheckError>;

/// Classification of a failure, as shown in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Assertion,
    Navigation,
    ElementNotFound,
    AmbiguousSelector,
    Timeout,
    Driver,
    Setup,
    Panic,
    Config,
    Other,
}

impl ErrorKind {
    /// Whether the failure points at the environment rather than the test logic
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ErrorKind::Navigation
                | ErrorKind::ElementNotFound
                | ErrorKind::AmbiguousSelector
                | ErrorKind::Driver
                | ErrorKind::Setup
        )
    }

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Assertion => "assertion",
            ErrorKind::Navigation => "navigation",
            ErrorKind::ElementNotFound => "element_not_found",
            ErrorKind::AmbiguousSelector => "ambiguous_selector",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Driver => "driver",
            ErrorKind::Setup => "setup",
            ErrorKind::Panic => "panic",
            ErrorKind::Config => "config",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WebcheckError {
    /// Create a navigation error
    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an element-not-found error
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create a driver error
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }

    /// Create a session setup error
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify this error for reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Assertion(_) => ErrorKind::Assertion,
            Self::Navigation { .. } => ErrorKind::Navigation,
            Self::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            Self::AmbiguousSelector { .. } => ErrorKind::AmbiguousSelector,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Driver(_) | Self::Http(_) => ErrorKind::Driver,
            Self::DriverNotFound(_) | Self::Setup(_) => ErrorKind::Setup,
            Self::Panic(_) => ErrorKind::Panic,
            Self::DuplicateName(_) | Self::Config(_) => ErrorKind::Config,
            Self::Json(_) | Self::Io(_) => ErrorKind::Other,
        }
    }
}

impl From<AssertionError> for WebcheckError {
    fn from(err: AssertionError) -> Self {
        Self::Assertion(err)
    }
}
