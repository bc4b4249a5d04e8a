// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{CooldownConfig, Limits, RawConfig, RunnerConfig, ToolConfig};
use crate::errors::{Result, RunnerError};
use crate::variants::catalog;
use crate::workspace::NamingConvention;

impl TryFrom<RawConfig> for RunnerConfig {
    type Error = crate::errors::RunnerError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_tool(&raw)?;
        validate_naming(&raw)?;
        let limits = validate_limits(&raw)?;
        validate_variants(&raw)?;
        let cooldown = validate_cooldown(&raw)?;

        let naming = NamingConvention::new(
            raw.naming.input_extension.trim(),
            raw.naming.output_suffix.trim(),
        );

        Ok(RunnerConfig::new_unchecked(
            ToolConfig {
                launchers: raw.tool.launchers.iter().map(|l| l.trim().to_string()).collect(),
                entrypoint: raw.tool.entrypoint.trim().to_string(),
                working_dir: raw.tool.working_dir,
            },
            raw.paths.upload_dir,
            raw.paths.search_roots,
            naming,
            limits,
            raw.resolve.scan,
            raw.variants.default_preset.trim().to_lowercase(),
            raw.variants.bare_fallback,
            cooldown,
        ))
    }
}

fn validate_tool(cfg: &RawConfig) -> Result<()> {
    if cfg.tool.launchers.is_empty() {
        return Err(RunnerError::Config(
            "[tool].launchers must name at least one launcher".to_string(),
        ));
    }
    if cfg.tool.launchers.iter().any(|l| l.trim().is_empty()) {
        return Err(RunnerError::Config(
            "[tool].launchers must not contain empty entries".to_string(),
        ));
    }
    if cfg.tool.entrypoint.trim().is_empty() {
        return Err(RunnerError::Config(
            "[tool].entrypoint must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_naming(cfg: &RawConfig) -> Result<()> {
    let ext = cfg.naming.input_extension.trim();
    if ext.is_empty() || ext.contains(['.', '/', '\\']) {
        return Err(RunnerError::Config(format!(
            "[naming].input_extension must be a bare extension like \"lua\" (got {:?})",
            cfg.naming.input_extension
        )));
    }

    let suffix = cfg.naming.output_suffix.trim();
    if suffix.is_empty() || suffix.contains(['/', '\\', '*', '?', '[', '{']) {
        return Err(RunnerError::Config(format!(
            "[naming].output_suffix must be a non-empty plain suffix (got {:?})",
            cfg.naming.output_suffix
        )));
    }
    Ok(())
}

fn validate_limits(cfg: &RawConfig) -> Result<Limits> {
    let raw = &cfg.limits;
    let attempt_timeout = parse_duration(&raw.attempt_timeout)
        .map_err(|e| RunnerError::Config(format!("[limits].attempt_timeout: {e}")))?;
    if attempt_timeout.is_zero() {
        return Err(RunnerError::Config(
            "[limits].attempt_timeout must be greater than zero".to_string(),
        ));
    }

    let caps = [
        ("max_source_bytes", raw.max_source_bytes),
        ("max_capture_bytes", raw.max_capture_bytes),
        ("max_error_chars", raw.max_error_chars),
        ("max_entry_chars", raw.max_entry_chars),
        ("max_transcript_chars", raw.max_transcript_chars),
    ];
    for (name, value) in caps {
        if value == 0 {
            return Err(RunnerError::Config(format!(
                "[limits].{name} must be >= 1 (got 0)"
            )));
        }
    }

    Ok(Limits {
        attempt_timeout,
        max_source_bytes: raw.max_source_bytes,
        max_capture_bytes: raw.max_capture_bytes,
        max_error_chars: raw.max_error_chars,
        max_entry_chars: raw.max_entry_chars,
        max_transcript_chars: raw.max_transcript_chars,
    })
}

fn validate_variants(cfg: &RawConfig) -> Result<()> {
    let name = cfg.variants.default_preset.trim();
    if catalog::find_preset(name).is_none() {
        return Err(RunnerError::Config(format!(
            "[variants].default_preset '{}' is not a known preset (expected one of: {})",
            name,
            catalog::preset_names().join(", ")
        )));
    }
    Ok(())
}

fn validate_cooldown(cfg: &RawConfig) -> Result<CooldownConfig> {
    let window = parse_duration(&cfg.cooldown.window)
        .map_err(|e| RunnerError::Config(format!("[cooldown].window: {e}")))?;
    Ok(CooldownConfig {
        window,
        admins: cfg
            .cooldown
            .admins
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = RunnerConfig::try_from(RawConfig::default()).unwrap();
        assert_eq!(cfg.tool.launchers, vec!["lua".to_string()]);
        assert_eq!(cfg.limits.attempt_timeout, Duration::from_secs(300));
        assert_eq!(cfg.default_preset, "safe");
        assert_eq!(
            cfg.search_roots(),
            vec![
                PathBuf::from("/app/hercules/src"),
                PathBuf::from("/app/outputs")
            ]
        );
    }

    #[test]
    fn empty_launchers_rejected() {
        let mut raw = RawConfig::default();
        raw.tool.launchers.clear();
        match RunnerConfig::try_from(raw) {
            Err(RunnerError::Config(msg)) => assert!(msg.contains("launchers")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut raw = RawConfig::default();
        raw.limits.attempt_timeout = "0s".to_string();
        assert!(matches!(
            RunnerConfig::try_from(raw),
            Err(RunnerError::Config(_))
        ));
    }

    #[test]
    fn unknown_default_preset_rejected() {
        let mut raw = RawConfig::default();
        raw.variants.default_preset = "ultra".to_string();
        match RunnerConfig::try_from(raw) {
            Err(RunnerError::Config(msg)) => {
                assert!(msg.contains("ultra"));
                assert!(msg.contains("safe"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn dotted_extension_rejected() {
        let mut raw = RawConfig::default();
        raw.naming.input_extension = ".lua".to_string();
        assert!(matches!(
            RunnerConfig::try_from(raw),
            Err(RunnerError::Config(_))
        ));
    }

    #[test]
    fn working_dir_is_not_duplicated_in_search_roots() {
        let mut raw = RawConfig::default();
        raw.paths.search_roots = vec![
            PathBuf::from("/app/hercules/src"),
            PathBuf::from("/srv/out"),
        ];
        let cfg = RunnerConfig::try_from(raw).unwrap();
        assert_eq!(
            cfg.search_roots(),
            vec![PathBuf::from("/app/hercules/src"), PathBuf::from("/srv/out")]
        );
    }
}
