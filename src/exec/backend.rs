// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The job runner talks to a `ProcessBackend` instead of spawning processes
//! directly. This makes it easy to swap in a scripted fake in tests while
//! keeping the production implementation in [`process`](super::process).

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::Result;
use crate::exec::process::{run_process, ExecutionOutcome};
use crate::variants::InvocationVariant;

/// Trait abstracting how one invocation variant is executed.
///
/// Production code uses [`RealProcessBackend`]; tests can provide their own
/// implementation that writes output files without spawning processes.
pub trait ProcessBackend: Send + Sync {
    /// Run `variant` in `working_dir` under `deadline`.
    ///
    /// A deadline overrun is reported through `ExecutionOutcome::timed_out`,
    /// not as an error. Errors mean the attempt could not run at all (e.g. the
    /// launcher is missing).
    fn run<'a>(
        &'a self,
        variant: &'a InvocationVariant,
        working_dir: &'a Path,
        deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionOutcome>> + Send + 'a>>;
}

/// Real backend: spawns the tool with `tokio::process`.
#[derive(Debug, Clone)]
pub struct RealProcessBackend {
    max_capture_bytes: usize,
}

impl RealProcessBackend {
    pub fn new(max_capture_bytes: usize) -> Self {
        Self { max_capture_bytes }
    }
}

impl ProcessBackend for RealProcessBackend {
    fn run<'a>(
        &'a self,
        variant: &'a InvocationVariant,
        working_dir: &'a Path,
        deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionOutcome>> + Send + 'a>> {
        let cap = self.max_capture_bytes;
        Box::pin(async move {
            let outcome = run_process(variant, working_dir, deadline, cap).await?;
            Ok(outcome)
        })
    }
}
