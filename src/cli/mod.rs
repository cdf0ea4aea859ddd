//! CLI module
//!
//! Console output and exit status for the `run-tests` binary.

mod output;

pub use output::{print_report, print_test_list, RunStatus};
