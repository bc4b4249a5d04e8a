// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawConfig, RunnerConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** validate limits,
/// durations or the preset name. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Parses durations and checks limits, naming and the default preset.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunnerConfig> {
    let raw_config = load_from_path(&path)?;
    let config = RunnerConfig::try_from(raw_config)?;
    Ok(config)
}

/// Default config path: `Runner.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Runner.toml")
}
