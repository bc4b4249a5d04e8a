#![allow(dead_code)]

use std::path::PathBuf;

use hercules_runner::config::{RawConfig, RunnerConfig};
use hercules_runner::types::ScanPolicy;

/// Builder for `RunnerConfig` to simplify test setup.
///
/// Starts from the built-in defaults and goes through the same validation as
/// a loaded TOML file.
pub struct RunnerConfigBuilder {
    config: RawConfig,
}

impl RunnerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfig::default(),
        }
    }

    pub fn launchers(mut self, launchers: &[&str]) -> Self {
        self.config.tool.launchers = launchers.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.config.tool.entrypoint = entrypoint.into();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tool.working_dir = dir.into();
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.paths.upload_dir = dir.into();
        self
    }

    pub fn search_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.config.paths.search_roots = roots;
        self
    }

    pub fn attempt_timeout(mut self, timeout: &str) -> Self {
        self.config.limits.attempt_timeout = timeout.to_string();
        self
    }

    pub fn max_source_bytes(mut self, bytes: usize) -> Self {
        self.config.limits.max_source_bytes = bytes;
        self
    }

    pub fn max_error_chars(mut self, chars: usize) -> Self {
        self.config.limits.max_error_chars = chars;
        self
    }

    pub fn scan(mut self, policy: ScanPolicy) -> Self {
        self.config.resolve.scan = policy;
        self
    }

    pub fn default_preset(mut self, name: &str) -> Self {
        self.config.variants.default_preset = name.to_string();
        self
    }

    pub fn bare_fallback(mut self, enabled: bool) -> Self {
        self.config.variants.bare_fallback = enabled;
        self
    }

    pub fn raw(self) -> RawConfig {
        self.config
    }

    pub fn build(self) -> RunnerConfig {
        RunnerConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for RunnerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
