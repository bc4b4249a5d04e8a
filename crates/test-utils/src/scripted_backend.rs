use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use hercules_runner::errors::Result;
use hercules_runner::exec::{ExecutionOutcome, ProcessBackend};
use hercules_runner::variants::InvocationVariant;

type Handler =
    Box<dyn Fn(&InvocationVariant, &Path) -> anyhow::Result<ExecutionOutcome> + Send + Sync>;

/// A fake backend that:
/// - records every command line it was asked to run
/// - optionally takes `delay` of (virtual) time per attempt
/// - delegates the "effects" of the run (writing output files, exit codes)
///   to a closure.
///
/// When `delay` exceeds the attempt deadline the handler is skipped and a
/// timed-out outcome is returned, mirroring the real backend.
pub struct ScriptedBackend {
    handler: Handler,
    delay: Duration,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&InvocationVariant, &Path) -> anyhow::Result<ExecutionOutcome> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Token lists of every invocation, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ProcessBackend for ScriptedBackend {
    fn run<'a>(
        &'a self,
        variant: &'a InvocationVariant,
        working_dir: &'a Path,
        deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionOutcome>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(variant.tokens().to_vec());

            if !self.delay.is_zero() {
                if self.delay > deadline {
                    tokio::time::sleep(deadline).await;
                    return Ok(timed_out(deadline));
                }
                tokio::time::sleep(self.delay).await;
            }

            let outcome = (self.handler)(variant, working_dir)?;
            Ok(outcome)
        })
    }
}

/// A finished run with the given exit code and empty streams.
pub fn exited(code: i32) -> ExecutionOutcome {
    ExecutionOutcome {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: String::new(),
        stdout_truncated: false,
        stderr_truncated: false,
        elapsed: Duration::from_millis(1),
        timed_out: false,
    }
}

/// A finished run that failed with `stderr`.
pub fn failed_with(code: i32, stderr: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        stderr: stderr.to_string(),
        ..exited(code)
    }
}

/// A run killed at its deadline.
pub fn timed_out(after: Duration) -> ExecutionOutcome {
    ExecutionOutcome {
        exit_code: None,
        elapsed: after,
        timed_out: true,
        ..exited(0)
    }
}
