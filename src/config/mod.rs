// src/config/mod.rs

//! Configuration loading and validation for the runner.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate limits, durations, naming and presets (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    CooldownConfig, CooldownSection, Limits, LimitsSection, NamingSection, PathsSection,
    RawConfig, ResolveSection, RunnerConfig, ToolConfig, ToolSection, VariantsSection,
};
