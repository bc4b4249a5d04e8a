// src/engine/mod.rs

//! Job orchestration.
//!
//! - [`retry`] is the pure state machine that walks invocation variants.
//! - [`cleanup`] guarantees request-scoped files are removed on every exit
//!   path.
//! - [`runner`] is the async shell: it allocates the workspace, runs attempts
//!   through a [`ProcessBackend`](crate::exec::ProcessBackend), resolves
//!   output and folds everything into a [`JobResult`].
//! - [`stats`] holds caller-owned counters and the per-user cooldown table.

pub mod cleanup;
pub mod retry;
pub mod runner;
pub mod stats;

pub use cleanup::ArtifactGuard;
pub use retry::{AttemptReport, RetryCommand, RetryMachine, RetryState, RetryVerdict};
pub use runner::{JobRequest, JobResult, JobRunner};
pub use stats::{CooldownStatus, CooldownTable, RunnerStats, StatsSnapshot};
