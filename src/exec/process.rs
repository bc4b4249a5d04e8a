// src/exec/process.rs

//! Run one invocation of the external tool under a deadline.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::exec::capture::{read_bounded, Captured};
use crate::variants::InvocationVariant;

/// How long to wait for the capture tasks once the child is gone. Pipes close
/// as soon as the process group is dead, so this only matters for children
/// that escaped the group.
const IO_CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything observed from one process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Exit code; `None` when killed by a signal or never reaped.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub elapsed: Duration,
    pub timed_out: bool,
}

impl ExecutionOutcome {
    /// Most useful error text: stderr, else stdout, else empty.
    pub fn error_text(&self) -> &str {
        if !self.stderr.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Kills the child's whole process group when dropped, unless disarmed.
///
/// This is what terminates descendants on deadline expiry and when the
/// surrounding future is cancelled mid-run.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn kill(&self) {
        if let Some(pgid) = self.pgid {
            kill_process_group(pgid);
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid {
            debug!(pgid, "process group guard dropped while armed; killing group");
            kill_process_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
    // addresses the process group we created with `process_group(0)`.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, error = %err, "failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// Spawn `variant` in `working_dir`, wait for it at most `deadline`, and
/// capture up to `max_capture_bytes` of each output stream.
///
/// On deadline expiry the process group is killed and the child reaped; the
/// outcome is returned with `timed_out = true` and whatever output was
/// captured. Only spawn and wait failures are errors.
pub async fn run_process(
    variant: &InvocationVariant,
    working_dir: &Path,
    deadline: Duration,
    max_capture_bytes: usize,
) -> Result<ExecutionOutcome> {
    info!(
        cmd = %variant,
        cwd = %working_dir.display(),
        deadline_ms = deadline.as_millis() as u64,
        "starting tool process"
    );

    let mut cmd = Command::new(variant.program());
    cmd.args(variant.args())
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let started = Instant::now();
    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning `{}` in {}", variant.program(), working_dir.display()))?;

    let mut group = ProcessGroupGuard::new(child.id());

    let stdout_task = child
        .stdout
        .take()
        .map(|s| tokio::spawn(read_bounded(s, max_capture_bytes)));
    let stderr_task = child
        .stderr
        .take()
        .map(|s| tokio::spawn(read_bounded(s, max_capture_bytes)));

    let (exit_code, timed_out) = tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for `{}`", variant.program())
            })?;
            (status.code(), false)
        }

        () = tokio::time::sleep(deadline) => {
            warn!(
                cmd = %variant,
                deadline_ms = deadline.as_millis() as u64,
                "tool process exceeded deadline; killing process group"
            );
            group.kill();
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "start_kill after group kill");
            }
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(error = %e, "failed to reap timed-out process");
                    None
                }
            };
            (code, true)
        }
    };

    // Stray descendants must not outlive the attempt.
    group.kill();
    group.disarm();

    let elapsed = started.elapsed();
    let (stdout, stdout_truncated) = join_capture(stdout_task, "stdout").await.into_text();
    let (stderr, stderr_truncated) = join_capture(stderr_task, "stderr").await.into_text();

    info!(
        cmd = %variant,
        exit_code = ?exit_code,
        timed_out,
        elapsed_ms = elapsed.as_millis() as u64,
        "tool process finished"
    );

    Ok(ExecutionOutcome {
        exit_code,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        elapsed,
        timed_out,
    })
}

async fn join_capture(
    task: Option<JoinHandle<std::io::Result<Captured>>>,
    stream: &'static str,
) -> Captured {
    let Some(task) = task else {
        return Captured::default();
    };
    let abort = task.abort_handle();
    match timeout(IO_CAPTURE_TIMEOUT, task).await {
        Ok(Ok(Ok(captured))) => captured,
        Ok(Ok(Err(err))) => {
            warn!(stream, error = %err, "capture failed");
            Captured::default()
        }
        Ok(Err(err)) => {
            warn!(stream, error = %err, "capture task panicked");
            Captured::default()
        }
        Err(_) => {
            warn!(stream, "capture timed out; a descendant may still hold the pipe");
            abort.abort();
            Captured::default()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::variants::VariantKind;

    fn sh(script: &str) -> InvocationVariant {
        InvocationVariant::new(
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            VariantKind::Bare,
        )
    }

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_process(
            &sh("echo out; echo err >&2; exit 3"),
            dir.path(),
            Duration::from_secs(5),
            1024,
        )
        .await
        .unwrap();

        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
        assert!(!outcome.timed_out);
        assert_eq!(outcome.error_text(), "err\n");
    }

    #[tokio::test]
    async fn runs_in_the_given_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        run_process(&sh("echo hi > here.txt"), dir.path(), Duration::from_secs(5), 1024)
            .await
            .unwrap();
        assert!(dir.path().join("here.txt").is_file());
    }

    #[tokio::test]
    async fn deadline_kills_and_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let outcome = run_process(
            &sh("echo started; sleep 30"),
            dir.path(),
            Duration::from_millis(300),
            1024,
        )
        .await
        .unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        assert_eq!(outcome.stdout, "started\n");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn oversized_output_is_truncated_with_marker() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_process(
            &sh("i=0; while [ $i -lt 200 ]; do echo 0123456789; i=$((i+1)); done"),
            dir.path(),
            Duration::from_secs(5),
            64,
        )
        .await
        .unwrap();

        assert!(outcome.stdout_truncated);
        assert!(outcome.stdout.ends_with("[... truncated 2136 bytes]"));
    }

    #[tokio::test]
    async fn missing_launcher_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let variant = InvocationVariant::new(
            vec!["definitely-not-a-launcher-7f3a".to_string()],
            VariantKind::Bare,
        );
        let err = run_process(&variant, dir.path(), Duration::from_secs(1), 64)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("definitely-not-a-launcher-7f3a"));
    }
}
