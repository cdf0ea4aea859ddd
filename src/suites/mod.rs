//! Built-in test suites shipped with `run-tests`

pub mod todo;

use crate::core::Result;
use crate::registry::TestRegistry;

/// Registry holding every built-in test
///
/// Fails on duplicate test names before anything runs.
pub fn builtin() -> Result<TestRegistry> {
    let mut registry = TestRegistry::new();
    todo::register(&mut registry)?;
    Ok(registry)
}
