//! Configuration management for webcheck
//!
//! Supports environment variables, config files, and runtime overrides.
//! Priority: CLI args > env vars > config file > defaults.
//!
//! Config file location: ~/.config/webcheck/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::{Result, WebcheckError};

/// Main configuration for webcheck
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Browser configuration
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Test runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Origin that relative navigations resolve against
    /// Default: http://localhost:3000
    pub base_url: String,
    /// Per-test deadline in ms when the test declares none
    /// Default: 30000
    pub timeout_ms: u64,
    /// How long text expectations keep retrying, in ms
    /// Default: 5000
    pub expect_timeout_ms: u64,
    /// Grace period for closing a session before it is force-aborted
    /// Default: 5000
    pub teardown_grace_ms: u64,
    /// Deadline for launching a driver session
    /// Default: 30000
    pub launch_timeout_ms: u64,
    /// Number of tests allowed to run concurrently
    /// Default: 1
    pub jobs: usize,
    /// Optional JSON-lines report file
    pub report_path: Option<PathBuf>,
    /// Probe the base URL over HTTP before running anything
    pub preflight: bool,
}

/// Browser driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Which driver backs the sessions
    pub driver: DriverKind,
    /// Path or name of the agent-browser executable
    pub binary: String,
    /// Prefix for per-test session names
    pub session_prefix: String,
    /// Whether to run in headed mode (visible browser)
    pub headed: bool,
    /// Default timeout for browser operations in ms
    pub action_timeout_ms: u64,
}

/// Available browser drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverKind {
    /// Real browser through the agent-browser CLI
    #[default]
    AgentBrowser,
    /// In-process page model serving the built-in TodoMVC app
    Memory,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::AgentBrowser => write!(f, "agent-browser"),
            DriverKind::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for DriverKind {
    type Err = WebcheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "agent-browser" | "browser" => Ok(DriverKind::AgentBrowser),
            "memory" => Ok(DriverKind::Memory),
            other => Err(WebcheckError::config(format!(
                "Unknown driver '{}'. Available: agent-browser, memory",
                other
            ))),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 30_000,
            expect_timeout_ms: 5_000,
            teardown_grace_ms: 5_000,
            launch_timeout_ms: 30_000,
            jobs: 1,
            report_path: None,
            preflight: false,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            binary: "agent-browser".to_string(),
            session_prefix: "webcheck".to_string(),
            headed: false,
            action_timeout_ms: 10_000,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("webcheck")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from the default file (if any) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit file, or the default location
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let default_path = Self::config_file();
                if default_path.exists() {
                    Self::load_from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_from(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a file only
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WebcheckError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| WebcheckError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| WebcheckError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Apply environment overrides using the given variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BASE_URL") {
            self.runner.base_url = url;
        }

        if let Some(ms) = lookup("TEST_TIMEOUT_MS") {
            self.runner.timeout_ms = ms.trim().parse().map_err(|_| {
                WebcheckError::config(format!("TEST_TIMEOUT_MS is not a number: {}", ms))
            })?;
        }

        if let Some(path) = lookup("WEBCHECK_REPORT") {
            self.runner.report_path = Some(PathBuf::from(path));
        }

        if let Some(jobs) = lookup("WEBCHECK_JOBS") {
            self.runner.jobs = jobs.trim().parse().map_err(|_| {
                WebcheckError::config(format!("WEBCHECK_JOBS is not a number: {}", jobs))
            })?;
        }

        if let Some(driver) = lookup("WEBCHECK_DRIVER") {
            self.browser.driver = driver.parse()?;
        }

        if let Some(headed) = lookup("WEBCHECK_HEADED") {
            self.browser.headed = is_truthy(&headed);
        }

        if let Some(binary) = lookup("WEBCHECK_BROWSER_BIN") {
            self.browser.binary = binary;
        }

        Ok(())
    }

    /// Reject values the runner cannot work with
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.runner.base_url).map_err(|e| {
            WebcheckError::config(format!(
                "Invalid base URL '{}': {}",
                self.runner.base_url, e
            ))
        })?;

        if self.runner.timeout_ms == 0 {
            return Err(WebcheckError::config("Test timeout must be greater than zero"));
        }

        if self.runner.jobs == 0 {
            return Err(WebcheckError::config("jobs must be at least 1"));
        }

        Ok(())
    }

    /// Default per-test deadline
    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.runner.timeout_ms)
    }

    /// Retry window for text expectations
    pub fn expect_timeout(&self) -> Duration {
        Duration::from_millis(self.runner.expect_timeout_ms)
    }

    /// Grace period for session teardown
    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.runner.teardown_grace_ms)
    }

    /// Deadline for launching a driver session
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.runner.launch_timeout_ms)
    }

    /// Default timeout for a single session operation
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.browser.action_timeout_ms)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| WebcheckError::config(format!("Failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.runner.base_url, "http://localhost:3000");
        assert_eq!(config.runner.timeout_ms, 30_000);
        assert_eq!(config.runner.jobs, 1);
        assert_eq!(config.browser.driver, DriverKind::AgentBrowser);
        assert_eq!(config.browser.binary, "agent-browser");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_from(lookup(&[
                ("BASE_URL", "http://127.0.0.1:8080"),
                ("TEST_TIMEOUT_MS", "1500"),
                ("WEBCHECK_DRIVER", "memory"),
                ("WEBCHECK_HEADED", "1"),
            ]))
            .unwrap();

        assert_eq!(config.runner.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.test_timeout(), Duration::from_millis(1500));
        assert_eq!(config.browser.driver, DriverKind::Memory);
        assert!(config.browser.headed);
    }

    #[test]
    fn test_bad_timeout_env_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env_from(lookup(&[("TEST_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("TEST_TIMEOUT_MS"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.runner.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [runner]
            base_url = "http://todo.local"

            [browser]
            driver = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.runner.base_url, "http://todo.local");
        assert_eq!(config.runner.timeout_ms, 30_000);
        assert_eq!(config.browser.driver, DriverKind::Memory);
        assert_eq!(config.browser.session_prefix, "webcheck");
    }

    #[test]
    fn test_load_from_missing_explicit_file() {
        let err = Config::load_from_file(Path::new("/nonexistent/webcheck.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_to_toml_round_trips_driver() {
        let mut config = Config::default();
        config.browser.driver = DriverKind::Memory;
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("driver = \"memory\""));
        assert!(rendered.contains("base_url"));
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("webcheck"));
    }
}
