//! Core module - shared infrastructure for webcheck
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the runner.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{ErrorKind, Result, WebcheckError};
pub use types::*;
