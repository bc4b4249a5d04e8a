// src/engine/runner.rs

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::diagnostics::{bounded_message, Transcript};
use crate::errors::RunnerError;
use crate::exec::{ExecutionOutcome, ProcessBackend, RealProcessBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::resolve::{self, ResolveRequest, ResolvedOutput};
use crate::types::FailureKind;
use crate::variants::{self, InvocationVariant, Selection, VariantContext};
use crate::workspace::{self, RequestIdentity};

use super::cleanup::ArtifactGuard;
use super::retry::{AttemptReport, RetryCommand, RetryMachine, RetryVerdict};

const NO_OUTPUT: &str = "no output file generated";

/// One unit of work for [`JobRunner::submit`].
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub source: String,
    pub selection: Selection,
    /// Attach the rendered transcript to the result.
    pub want_diagnostics: bool,
    /// Overall job deadline. Each attempt runs under
    /// `min(limits.attempt_timeout, remaining)`.
    pub deadline: Option<Duration>,
}

impl JobRequest {
    pub fn new(source: impl Into<String>, selection: Selection) -> Self {
        Self {
            source: source.into(),
            selection,
            want_diagnostics: false,
            deadline: None,
        }
    }

    pub fn with_diagnostics(mut self, yes: bool) -> Self {
        self.want_diagnostics = yes;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Success {
        transformed_text: String,
        #[serde(rename = "elapsed_secs", serialize_with = "secs_f64")]
        elapsed: Duration,
        original_size: usize,
        transformed_size: usize,
        identity: RequestIdentity,
        attempts: usize,
        /// The output was attributed by an unanchored scan and may belong to
        /// a concurrent job.
        ambiguous: bool,
        diagnostics: Option<String>,
    },
    Failure {
        kind: FailureKind,
        error_message: String,
        /// `None` when the job failed before an identity was allocated.
        identity: Option<RequestIdentity>,
        attempts: usize,
        diagnostics: Option<String>,
    },
}

fn secs_f64<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            JobResult::Success { attempts, .. } | JobResult::Failure { attempts, .. } => *attempts,
        }
    }

    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            JobResult::Success { diagnostics, .. } | JobResult::Failure { diagnostics, .. } => {
                diagnostics.as_deref()
            }
        }
    }

    /// Size change in percent, for successes with a non-empty original.
    pub fn growth_percent(&self) -> Option<f64> {
        match self {
            JobResult::Success {
                original_size,
                transformed_size,
                ..
            } if *original_size > 0 => Some(
                (*transformed_size as f64 - *original_size as f64) / *original_size as f64 * 100.0,
            ),
            _ => None,
        }
    }
}

/// Result of one attempt, as seen by the shell.
enum AttemptOutcome {
    Output {
        text: String,
        resolved: ResolvedOutput,
    },
    Failed {
        error: String,
        timed_out: bool,
    },
}

/// Entry point for transformation jobs.
///
/// Cheap to clone; every clone shares the same configuration and backends.
/// Jobs are independent futures with no shared queue; concurrency is whatever
/// the caller drives.
#[derive(Clone)]
pub struct JobRunner {
    config: Arc<RunnerConfig>,
    fs: Arc<dyn FileSystem>,
    backend: Arc<dyn ProcessBackend>,
}

impl fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("config", &self.config)
            .field("fs", &self.fs)
            .finish_non_exhaustive()
    }
}

impl JobRunner {
    /// Runner over the real filesystem and real processes.
    pub fn new(config: RunnerConfig) -> Self {
        let backend = RealProcessBackend::new(config.limits.max_capture_bytes);
        Self::with_backends(config, Arc::new(RealFileSystem), Arc::new(backend))
    }

    pub fn with_backends(
        config: RunnerConfig,
        fs: Arc<dyn FileSystem>,
        backend: Arc<dyn ProcessBackend>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fs,
            backend,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// The variants `submit` would try for `selection` with the given input
    /// path, in order. Nothing is executed.
    pub fn plan(&self, selection: &Selection, input_path: &Path) -> Vec<InvocationVariant> {
        variants::build(selection, &self.variant_context(input_path))
    }

    fn variant_context<'a>(&'a self, input_path: &'a Path) -> VariantContext<'a> {
        VariantContext {
            launchers: &self.config.tool.launchers,
            entrypoint: &self.config.tool.entrypoint,
            input_path,
            default_preset: &self.config.default_preset,
            bare_fallback: self.config.bare_fallback,
        }
    }

    /// Run one job to completion.
    ///
    /// Never returns an error: every failure is folded into
    /// [`JobResult::Failure`]. Dropping the returned future kills a running
    /// tool process and removes this job's artifacts.
    pub async fn submit(&self, request: JobRequest) -> JobResult {
        let started = Instant::now();
        let started_wall = SystemTime::now();
        let limits = &self.config.limits;
        let mut transcript = Transcript::new(limits.max_entry_chars, limits.max_transcript_chars);
        let want = request.want_diagnostics;

        let original_size = request.source.len();
        if original_size > limits.max_source_bytes {
            let err = RunnerError::SourceTooLarge {
                size: original_size,
                limit: limits.max_source_bytes,
            };
            info!(bytes = original_size, "rejecting oversized source");
            transcript.record("rejected", &err.to_string());
            return self.failure(FailureKind::SourceTooLarge, &err.to_string(), None, 0, &transcript, want);
        }

        let (identity, input) = match workspace::allocate(
            self.fs.as_ref(),
            &self.config.upload_dir,
            &self.config.naming,
            &request.source,
        ) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "workspace allocation failed");
                transcript.record("workspace", &err.to_string());
                return self.failure(FailureKind::Workspace, &err.to_string(), None, 0, &transcript, want);
            }
        };

        let search_roots = self.config.search_roots();
        let candidates = resolve::identity_candidates(
            &identity,
            input.path(),
            &search_roots,
            &self.config.naming,
        );
        let mut guard = ArtifactGuard::new(
            self.fs.clone(),
            identity,
            input.path().to_path_buf(),
            candidates,
        );

        let variants = variants::build(&request.selection, &self.variant_context(input.path()));
        info!(
            job = %identity,
            selection = %request.selection,
            variants = variants.len(),
            bytes = original_size,
            "job started"
        );
        transcript.record(
            "job",
            &format!("{identity}: {} ({} variants)", request.selection, variants.len()),
        );

        let mut machine = RetryMachine::new(variants.len());
        let mut command = machine.start();
        let mut success: Option<(String, ResolvedOutput)> = None;

        let verdict = loop {
            let i = match command {
                RetryCommand::Run(i) => i,
                RetryCommand::Finish(verdict) => break verdict,
            };
            let variant = &variants[i];

            let remaining = request
                .deadline
                .map(|d| d.saturating_sub(started.elapsed()));
            if remaining == Some(Duration::ZERO) {
                info!(job = %identity, attempt = i + 1, "job deadline exhausted; no further attempts");
                transcript.record("deadline", "job deadline exhausted before next attempt");
                command = machine.on_deadline();
                continue;
            }
            let attempt_deadline = remaining
                .map_or(limits.attempt_timeout, |r| r.min(limits.attempt_timeout));

            let swept = guard.sweep_stale_outputs();
            if swept > 0 {
                debug!(job = %identity, swept, "removed stale outputs before attempt");
            }

            transcript.record(format!("attempt {}", i + 1), &variant.to_string());
            let ctx = AttemptContext {
                identity: &identity,
                input_path: input.path(),
                search_roots: &search_roots,
                started_wall,
            };
            let report = match self
                .attempt(&ctx, i, variant, attempt_deadline, &mut transcript)
                .await
            {
                AttemptOutcome::Output { text, resolved } => {
                    guard.adopt_output(resolved.path.clone());
                    success = Some((text, resolved));
                    AttemptReport::Resolved
                }
                AttemptOutcome::Failed { error, timed_out } => {
                    transcript.record("attempt failed", &error);
                    AttemptReport::Failed { error, timed_out }
                }
            };
            command = machine.on_attempt(report);
        };

        guard.release();
        let elapsed = started.elapsed();

        match (verdict, success) {
            (RetryVerdict::Succeeded { attempts }, Some((text, resolved))) => {
                let ambiguous = resolved.anchoring.is_ambiguous();
                info!(
                    job = %identity,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    bytes = text.len(),
                    ambiguous,
                    "job succeeded"
                );
                transcript.record("result", &format!("success after {attempts} attempt(s)"));
                JobResult::Success {
                    transformed_size: text.len(),
                    transformed_text: text,
                    elapsed,
                    original_size,
                    identity,
                    attempts,
                    ambiguous,
                    diagnostics: want.then(|| transcript.render()),
                }
            }
            (RetryVerdict::Succeeded { attempts }, None) => {
                // Unreachable by construction; fail loudly rather than
                // report an empty success.
                warn!(job = %identity, "retry machine succeeded without an output");
                self.failure(FailureKind::ToolFailure, NO_OUTPUT, Some(identity), attempts, &transcript, want)
            }
            (
                RetryVerdict::Exhausted {
                    last_error,
                    timed_out,
                    attempts,
                },
                _,
            ) => {
                let kind = if timed_out {
                    FailureKind::Timeout
                } else {
                    FailureKind::ToolFailure
                };
                let message = last_error.unwrap_or_else(|| NO_OUTPUT.to_string());
                info!(
                    job = %identity,
                    attempts,
                    ?kind,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "job failed"
                );
                self.failure(kind, &message, Some(identity), attempts, &transcript, want)
            }
        }
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        index: usize,
        variant: &InvocationVariant,
        deadline: Duration,
        transcript: &mut Transcript,
    ) -> AttemptOutcome {
        let attempt = index + 1;
        info!(
            job = %ctx.identity,
            attempt,
            variant = %variant,
            kind = ?variant.kind(),
            deadline_ms = deadline.as_millis() as u64,
            "running attempt"
        );

        let outcome = match self
            .backend
            .run(variant, &self.config.tool.working_dir, deadline)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(job = %ctx.identity, attempt, error = %format!("{err:#}"), "attempt could not run");
                return AttemptOutcome::Failed {
                    error: format!("failed to run `{}`: {err:#}", variant.program()),
                    timed_out: false,
                };
            }
        };
        record_outcome(transcript, &outcome);

        if outcome.timed_out {
            // Whatever a killed run left behind is swept before the next
            // attempt, never read.
            return AttemptOutcome::Failed {
                error: RunnerError::ExecutionTimeout(deadline).to_string(),
                timed_out: true,
            };
        }

        let request = ResolveRequest {
            identity: ctx.identity,
            input_path: ctx.input_path,
            search_roots: ctx.search_roots,
            naming: &self.config.naming,
            policy: self.config.scan,
            job_started: ctx.started_wall,
        };
        let Some(resolved) = resolve::resolve(self.fs.as_ref(), &request) else {
            transcript.record("resolve", "no output found");
            let error = if outcome.error_text().trim().is_empty() {
                match outcome.exit_code {
                    Some(code) if code != 0 => format!("tool exited with code {code}; {NO_OUTPUT}"),
                    _ => NO_OUTPUT.to_string(),
                }
            } else {
                outcome.error_text().to_string()
            };
            return AttemptOutcome::Failed {
                error,
                timed_out: false,
            };
        };

        transcript.record(
            "resolve",
            &format!("{} ({:?})", resolved.path.display(), resolved.anchoring),
        );
        if resolved.anchoring.is_ambiguous() {
            transcript.record(
                "ambiguity",
                &format!(
                    "{} does not carry identity {}; it may belong to a concurrent job",
                    resolved.path.display(),
                    ctx.identity
                ),
            );
        }

        let bytes = match self.fs.read(&resolved.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(job = %ctx.identity, path = %resolved.path.display(), error = %err, "cannot read output");
                return AttemptOutcome::Failed {
                    error: format!("cannot read output {}: {err:#}", resolved.path.display()),
                    timed_out: false,
                };
            }
        };

        let text = match String::from_utf8_lossy(&bytes) {
            Cow::Borrowed(text) => text.to_string(),
            Cow::Owned(text) => {
                warn!(
                    job = %ctx.identity,
                    path = %resolved.path.display(),
                    bytes = bytes.len(),
                    "output is not valid UTF-8; invalid sequences replaced"
                );
                transcript.record(
                    "output",
                    &format!(
                        "{} is not valid UTF-8: {} bytes read, invalid sequences replaced with U+FFFD",
                        resolved.path.display(),
                        bytes.len()
                    ),
                );
                text
            }
        };
        if text.trim().is_empty() {
            return AttemptOutcome::Failed {
                error: format!("output file {} is empty", resolved.path.display()),
                timed_out: false,
            };
        }

        AttemptOutcome::Output { text, resolved }
    }

    fn failure(
        &self,
        kind: FailureKind,
        message: &str,
        identity: Option<RequestIdentity>,
        attempts: usize,
        transcript: &Transcript,
        want_diagnostics: bool,
    ) -> JobResult {
        JobResult::Failure {
            kind,
            error_message: bounded_message(message, self.config.limits.max_error_chars),
            identity,
            attempts,
            diagnostics: want_diagnostics.then(|| transcript.render()),
        }
    }
}

struct AttemptContext<'a> {
    identity: &'a RequestIdentity,
    input_path: &'a Path,
    search_roots: &'a [PathBuf],
    started_wall: SystemTime,
}

fn record_outcome(transcript: &mut Transcript, outcome: &ExecutionOutcome) {
    if !outcome.stdout.trim().is_empty() {
        transcript.record("stdout", &outcome.stdout);
    }
    if !outcome.stderr.trim().is_empty() {
        transcript.record("stderr", &outcome.stderr);
    }
    let exit = match outcome.exit_code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    };
    transcript.record(
        "exit",
        &format!(
            "code {exit}, {} ms{}",
            outcome.elapsed.as_millis(),
            if outcome.timed_out { ", timed out" } else { "" }
        ),
    );
}
