// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the external tool, using
//! `tokio::process::Command`, and reporting what happened back to the job
//! runner as an [`ExecutionOutcome`].
//!
//! - [`process`] runs one invocation under a deadline and terminates the whole
//!   process group on expiry or cancellation.
//! - [`capture`] drains stdout/stderr into bounded buffers.
//! - [`backend`] provides the `ProcessBackend` trait and the concrete
//!   `RealProcessBackend` used in production, which tests can replace with a
//!   fake implementation.

pub mod backend;
pub mod capture;
pub mod process;

pub use backend::{ProcessBackend, RealProcessBackend};
pub use process::{run_process, ExecutionOutcome};
