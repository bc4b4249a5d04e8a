#![allow(dead_code)]

pub use hercules_runner_test_utils::builders;
pub use hercules_runner_test_utils::init_tracing;
pub use hercules_runner_test_utils::scripted_backend;
pub use hercules_runner_test_utils::stub_tool;
pub use hercules_runner_test_utils::with_timeout;

use hercules_runner::{FailureKind, JobResult};

/// Unwrap a success, panicking with the failure details otherwise.
pub fn expect_success(result: &JobResult) -> (&str, usize, usize) {
    match result {
        JobResult::Success {
            transformed_text,
            original_size,
            transformed_size,
            ..
        } => (transformed_text.as_str(), *original_size, *transformed_size),
        JobResult::Failure {
            kind,
            error_message,
            diagnostics,
            ..
        } => panic!(
            "expected success, got {kind:?}: {error_message}\n{}",
            diagnostics.as_deref().unwrap_or("")
        ),
    }
}

/// Unwrap a failure into `(kind, message)`.
pub fn expect_failure(result: &JobResult) -> (FailureKind, &str) {
    match result {
        JobResult::Failure {
            kind,
            error_message,
            ..
        } => (*kind, error_message.as_str()),
        JobResult::Success { .. } => panic!("expected failure, got {result:?}"),
    }
}
