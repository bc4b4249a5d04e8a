// src/variants/mod.rs

//! Invocation variants for the external tool.
//!
//! - [`catalog`] holds the static preset and module tables.
//! - [`builder`] turns a caller's [`Selection`] into the ordered list of
//!   command lines the retry controller works through.

pub mod builder;
pub mod catalog;

pub use builder::{build, InvocationVariant, Selection, VariantContext, VariantKind};
pub use catalog::{Module, Preset, Stability};
