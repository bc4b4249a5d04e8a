// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::ScanPolicy;
use crate::workspace::NamingConvention;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [tool]
/// launchers = ["lua"]
/// entrypoint = "hercules.lua"
/// working_dir = "/app/hercules/src"
///
/// [paths]
/// upload_dir = "/app/uploads"
/// search_roots = ["/app/outputs"]
///
/// [limits]
/// attempt_timeout = "300s"
/// ```
///
/// All sections are optional and default to the stock container layout
/// under `/app`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    pub tool: ToolSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub naming: NamingSection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub resolve: ResolveSection,
    #[serde(default)]
    pub variants: VariantsSection,
    #[serde(default)]
    pub cooldown: CooldownSection,
}

/// `[tool]` section: how the external tool is launched.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSection {
    /// Launcher binaries, in order of preference (e.g. `["lua", "luajit"]`).
    #[serde(default = "default_launchers")]
    pub launchers: Vec<String>,

    /// Script entry point handed to the launcher, relative to `working_dir`.
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,

    /// Working directory of the tool. Always searched for output first.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
}

fn default_launchers() -> Vec<String> {
    vec!["lua".to_string()]
}

fn default_entrypoint() -> String {
    "hercules.lua".to_string()
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("/app/hercules/src")
}

impl Default for ToolSection {
    fn default() -> Self {
        Self {
            launchers: default_launchers(),
            entrypoint: default_entrypoint(),
            working_dir: default_working_dir(),
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Shared directory that receives job inputs.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Extra directories where the tool may deposit output.
    #[serde(default = "default_search_roots")]
    pub search_roots: Vec<PathBuf>,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("/app/uploads")
}

fn default_search_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/app/outputs")]
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            search_roots: default_search_roots(),
        }
    }
}

/// `[naming]` section: the tool's file naming convention.
#[derive(Debug, Clone, Deserialize)]
pub struct NamingSection {
    /// Extension of input files, without the dot.
    #[serde(default = "default_input_extension")]
    pub input_extension: String,

    /// Suffix the tool appends to the input stem for its output.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

fn default_input_extension() -> String {
    "lua".to_string()
}

fn default_output_suffix() -> String {
    "_obfuscated".to_string()
}

impl Default for NamingSection {
    fn default() -> Self {
        Self {
            input_extension: default_input_extension(),
            output_suffix: default_output_suffix(),
        }
    }
}

/// `[limits]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    /// Per-attempt deadline, e.g. `"300s"`.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout: String,

    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,

    /// Cap per captured stream (stdout and stderr separately).
    #[serde(default = "default_max_capture_bytes")]
    pub max_capture_bytes: usize,

    /// Cap on the caller-facing error message.
    #[serde(default = "default_max_error_chars")]
    pub max_error_chars: usize,

    #[serde(default = "default_max_entry_chars")]
    pub max_entry_chars: usize,

    #[serde(default = "default_max_transcript_chars")]
    pub max_transcript_chars: usize,
}

fn default_attempt_timeout() -> String {
    "300s".to_string()
}

fn default_max_source_bytes() -> usize {
    500_000
}

fn default_max_capture_bytes() -> usize {
    64 * 1024
}

fn default_max_error_chars() -> usize {
    500
}

fn default_max_entry_chars() -> usize {
    4_000
}

fn default_max_transcript_chars() -> usize {
    32_000
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            attempt_timeout: default_attempt_timeout(),
            max_source_bytes: default_max_source_bytes(),
            max_capture_bytes: default_max_capture_bytes(),
            max_error_chars: default_max_error_chars(),
            max_entry_chars: default_max_entry_chars(),
            max_transcript_chars: default_max_transcript_chars(),
        }
    }
}

/// `[resolve]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResolveSection {
    /// `"off"`, `"anchored"` (default) or `"unanchored"`.
    #[serde(default)]
    pub scan: ScanPolicy,
}

/// `[variants]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantsSection {
    /// Preset used for empty module sets and unknown preset names.
    #[serde(default = "default_preset")]
    pub default_preset: String,

    /// Append a last-resort invocation without any flags.
    #[serde(default = "default_bare_fallback")]
    pub bare_fallback: bool,
}

fn default_preset() -> String {
    "safe".to_string()
}

fn default_bare_fallback() -> bool {
    true
}

impl Default for VariantsSection {
    fn default() -> Self {
        Self {
            default_preset: default_preset(),
            bare_fallback: default_bare_fallback(),
        }
    }
}

/// `[cooldown]` section, consumed by front-ends through `CooldownTable`.
#[derive(Debug, Clone, Deserialize)]
pub struct CooldownSection {
    #[serde(default = "default_cooldown_window")]
    pub window: String,

    /// Users exempt from the cooldown.
    #[serde(default)]
    pub admins: Vec<String>,
}

fn default_cooldown_window() -> String {
    "30s".to_string()
}

impl Default for CooldownSection {
    fn default() -> Self {
        Self {
            window: default_cooldown_window(),
            admins: Vec::new(),
        }
    }
}

/// How the external tool is launched, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub launchers: Vec<String>,
    pub entrypoint: String,
    pub working_dir: PathBuf,
}

/// Size and time limits, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub attempt_timeout: Duration,
    pub max_source_bytes: usize,
    pub max_capture_bytes: usize,
    pub max_error_chars: usize,
    pub max_entry_chars: usize,
    pub max_transcript_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownConfig {
    pub window: Duration,
    pub admins: Vec<String>,
}

/// Validated runner configuration.
///
/// Only constructed through `TryFrom<RawConfig>` (see `validate.rs`), so the
/// rest of the crate can rely on non-empty launchers, a non-zero deadline and
/// a known default preset.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub tool: ToolConfig,
    pub upload_dir: PathBuf,
    extra_search_roots: Vec<PathBuf>,
    pub naming: NamingConvention,
    pub limits: Limits,
    pub scan: ScanPolicy,
    pub default_preset: String,
    pub bare_fallback: bool,
    pub cooldown: CooldownConfig,
}

impl RunnerConfig {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_unchecked(
        tool: ToolConfig,
        upload_dir: PathBuf,
        extra_search_roots: Vec<PathBuf>,
        naming: NamingConvention,
        limits: Limits,
        scan: ScanPolicy,
        default_preset: String,
        bare_fallback: bool,
        cooldown: CooldownConfig,
    ) -> Self {
        Self {
            tool,
            upload_dir,
            extra_search_roots,
            naming,
            limits,
            scan,
            default_preset,
            bare_fallback,
            cooldown,
        }
    }

    /// Directories probed for output: the tool's working directory first,
    /// then `[paths].search_roots` in order, without duplicates.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.tool.working_dir.clone()];
        for root in &self.extra_search_roots {
            if !roots.contains(root) {
                roots.push(root.clone());
            }
        }
        roots
    }
}
