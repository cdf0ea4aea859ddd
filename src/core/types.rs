//! Shared types used across webcheck modules
//!
//! Contains test outcomes and their status classification.

use serde::{Deserialize, Serialize};

use crate::core::error::{ErrorKind, WebcheckError};

/// Pass/fail status of a single test execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Passed => write!(f, "passed"),
            Status::Failed => write!(f, "failed"),
        }
    }
}

/// Classification of one test execution, with its diagnostic payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Body completed and every assertion it issued passed
    Passed,
    /// Body errored, panicked, timed out, or an assertion failed
    Failed {
        /// What kind of failure this was
        kind: ErrorKind,
        /// Human-readable failure message
        message: String,
    },
}

impl Outcome {
    /// Create a failed outcome from an error
    pub fn failed(error: &WebcheckError) -> Self {
        Self::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Status of this outcome
    pub fn status(&self) -> Status {
        match self {
            Outcome::Passed => Status::Passed,
            Outcome::Failed { .. } => Status::Failed,
        }
    }

    /// Whether the test passed
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// Failure kind, if failed
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { kind, .. } => Some(*kind),
        }
    }

    /// Failure message, if failed
    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { message, .. } => Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_from_error() {
        let outcome = Outcome::failed(&WebcheckError::element_not_found(".new-todo"));
        assert_eq!(outcome.status(), Status::Failed);
        assert_eq!(outcome.kind(), Some(ErrorKind::ElementNotFound));
        assert!(outcome.message().unwrap().contains(".new-todo"));
    }

    #[test]
    fn test_passed_outcome() {
        assert!(Outcome::Passed.is_passed());
        assert_eq!(Outcome::Passed.kind(), None);
        assert_eq!(Outcome::Passed.status().to_string(), "passed");
    }
}
