//! Response parsing for agent-browser `--json` output
//!
//! agent-browser wraps command results in a `{success, data, error}`
//! envelope. Older builds print the bare value instead, so both are accepted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Result, WebcheckError};

/// Envelope printed by agent-browser in JSON mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the operation succeeded
    #[serde(default)]
    pub success: bool,
    /// Command payload
    #[serde(default)]
    pub data: Option<Value>,
    /// Error message when the command failed
    #[serde(default)]
    pub error: Option<String>,
}

impl CommandResponse {
    /// Extract the evaluated result from the payload
    ///
    /// `eval` reports its value under `data.result`; anything else is taken
    /// as the value itself.
    pub fn into_result(self) -> Result<Value> {
        if !self.success {
            return Err(WebcheckError::driver(
                self.error
                    .unwrap_or_else(|| "agent-browser reported failure".to_string()),
            ));
        }

        match self.data {
            Some(Value::Object(mut map)) if map.contains_key("result") => {
                Ok(map.remove("result").unwrap_or(Value::Null))
            }
            Some(other) => Ok(other),
            None => Ok(Value::Null),
        }
    }
}

/// Parse the stdout of an `eval --json` command into the evaluated value
pub fn parse_eval_output(raw: &str) -> Result<Value> {
    let raw = raw.trim();
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| WebcheckError::driver(format!("Unparseable eval output '{}': {}", raw, e)))?;

    let is_envelope = value
        .as_object()
        .is_some_and(|obj| obj.contains_key("success"));

    if is_envelope {
        serde_json::from_value::<CommandResponse>(value)?.into_result()
    } else {
        Ok(value)
    }
}

/// Unwrap values produced by `JSON.stringify` in the page
fn unstringify(value: Value) -> Result<Value> {
    match value {
        Value::String(s) => Ok(serde_json::from_str(&s)?),
        other => Ok(other),
    }
}

/// Interpret an evaluated value as an ordered list of texts
pub fn texts_from_value(value: Value) -> Result<Vec<String>> {
    match unstringify(value)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                Value::Null => Ok(String::new()),
                other => Ok(other.to_string()),
            })
            .collect(),
        other => Err(WebcheckError::driver(format!(
            "Expected a list of texts, got {}",
            other
        ))),
    }
}

/// Interpret an evaluated value as an element count
pub fn count_from_value(value: Value) -> Result<usize> {
    let value = unstringify(value)?;
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| WebcheckError::driver(format!("Expected an element count, got {}", value)))
}
