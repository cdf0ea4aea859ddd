//! Browser driver - wraps the agent-browser CLI
//!
//! Every operation is one `agent-browser --session <name>` invocation, so
//! each test gets its own browser daemon keyed by its session name.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::core::{Result, WebcheckError};
use crate::session::driver::{BrowserDriver, DriverFactory};
use crate::session::response::{count_from_value, parse_eval_output, texts_from_value};

/// Text of every match, whitespace-collapsed like a rendered list item
fn query_text_script(selector: &str) -> Result<String> {
    let selector = serde_json::to_string(selector)?;
    Ok(format!(
        "JSON.stringify(Array.from(document.querySelectorAll({}), \
         el => (el.textContent || '').replace(/\\s+/g, ' ').trim()))",
        selector
    ))
}

fn count_script(selector: &str) -> Result<String> {
    let selector = serde_json::to_string(selector)?;
    Ok(format!("document.querySelectorAll({}).length", selector))
}

/// A failed `open` or load wait means the page never arrived
fn navigation_error(url: &str, error: WebcheckError) -> WebcheckError {
    match error {
        WebcheckError::Driver(reason) => WebcheckError::navigation(url, reason),
        other => other,
    }
}

/// Driver for one agent-browser session
pub struct AgentBrowserDriver {
    /// Executable name or path
    binary: String,
    /// Session name for isolation
    session_name: String,
    /// Whether to run in headed mode
    headed: bool,
}

impl AgentBrowserDriver {
    /// Create a new driver for the given session
    pub fn new(binary: impl Into<String>, session_name: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            session_name: session_name.into(),
            headed: false,
        }
    }

    /// Set headed mode
    pub fn set_headed(&mut self, headed: bool) {
        self.headed = headed;
    }

    /// Check if the agent-browser binary can be executed
    pub async fn is_available(binary: &str) -> bool {
        Command::new(binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["--session", &self.session_name]);

        if self.headed {
            cmd.arg("--headed");
        }

        cmd.args(args);
        cmd
    }

    /// Run an agent-browser command
    ///
    /// The child is killed if the returned future is dropped, which is how
    /// operation timeouts cancel a stuck browser call.
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        debug!(session = %self.session_name, ?args, "agent-browser");

        let mut cmd = self.command(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WebcheckError::DriverNotFound(self.binary.clone())
            } else {
                WebcheckError::driver(format!("Failed to run {}: {}", self.binary, e))
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(WebcheckError::driver(format!(
                "agent-browser {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )))
        }
    }

    /// Evaluate a script and return its JSON value
    async fn eval(&self, script: &str) -> Result<serde_json::Value> {
        let output = self.run_command(&["eval", script, "--json"]).await?;
        parse_eval_output(&output)
    }
}

#[async_trait]
impl BrowserDriver for AgentBrowserDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.run_command(&["open", url])
            .await
            .map_err(|e| navigation_error(url, e))?;

        self.run_command(&["wait", "--load", "load"])
            .await
            .map_err(|e| navigation_error(url, e))?;

        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.run_command(&["fill", selector, text]).await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.run_command(&["press", key]).await?;
        Ok(())
    }

    async fn query_text(&self, selector: &str) -> Result<Vec<String>> {
        let value = self.eval(&query_text_script(selector)?).await?;
        texts_from_value(value)
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let value = self.eval(&count_script(selector)?).await?;
        count_from_value(value)
    }

    async fn close(&self) -> Result<()> {
        self.run_command(&["close"]).await?;
        Ok(())
    }

    fn abort(&self) {
        // Detached: the daemon is told to exit without waiting for it
        let mut cmd = std::process::Command::new(&self.binary);
        cmd.args(["--session", &self.session_name, "close"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if let Err(e) = cmd.spawn() {
            debug!(session = %self.session_name, error = %e, "abort failed");
        }
    }
}

/// Launches one agent-browser session per test
#[derive(Debug, Clone)]
pub struct AgentBrowserFactory {
    binary: String,
    headed: bool,
}

impl AgentBrowserFactory {
    /// Create a factory using the given executable
    pub fn new(binary: impl Into<String>, headed: bool) -> Self {
        Self {
            binary: binary.into(),
            headed,
        }
    }
}

impl Default for AgentBrowserFactory {
    fn default() -> Self {
        Self::new("agent-browser", false)
    }
}

#[async_trait]
impl DriverFactory for AgentBrowserFactory {
    fn name(&self) -> &str {
        "agent-browser"
    }

    async fn launch(&self, session_name: &str) -> Result<Box<dyn BrowserDriver>> {
        if !AgentBrowserDriver::is_available(&self.binary).await {
            return Err(WebcheckError::DriverNotFound(self.binary.clone()));
        }

        let mut driver = AgentBrowserDriver::new(&self.binary, session_name);
        driver.set_headed(self.headed);
        Ok(Box::new(driver))
    }
}
