// src/diagnostics/mod.rs

//! Diagnostics collection for jobs.
//!
//! The external tool writes coloured, unbounded text to stdout/stderr. This
//! module normalises that text before it is stored or shown:
//!
//! - [`strip`] removes terminal escape sequences and bounds caller-facing
//!   error messages.
//! - [`transcript`] keeps a timestamped, capped per-job record that is only
//!   handed to the caller when they asked for diagnostics.

pub mod strip;
pub mod transcript;

pub use strip::{bounded_message, strip_ansi, truncate_chars};
pub use transcript::{Entry, Transcript};
