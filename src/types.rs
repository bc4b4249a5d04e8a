use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// How far the output resolver may go when the deterministic candidate paths
/// produced nothing.
///
/// - `Disabled`: never list directories; only identity-derived paths count.
/// - `AnchoredOnly`: list search roots, but accept only names that embed the
///   request identity (default).
/// - `AllowUnanchored`: additionally accept a fresh match without the
///   identity. Two jobs racing on an identity-agnostic output name can then
///   swap results; such matches are flagged as ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPolicy {
    #[serde(rename = "off")]
    Disabled,
    #[serde(rename = "anchored")]
    AnchoredOnly,
    #[serde(rename = "unanchored")]
    AllowUnanchored,
}

impl ScanPolicy {
    pub fn scans(self) -> bool {
        !matches!(self, ScanPolicy::Disabled)
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        ScanPolicy::AnchoredOnly
    }
}

impl FromStr for ScanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "disabled" => Ok(ScanPolicy::Disabled),
            "anchored" => Ok(ScanPolicy::AnchoredOnly),
            "unanchored" => Ok(ScanPolicy::AllowUnanchored),
            other => Err(format!(
                "invalid scan policy: {other} (expected \"off\", \"anchored\" or \"unanchored\")"
            )),
        }
    }
}

/// Why a job failed, as reported to front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The input artifact could not be written.
    Workspace,
    /// The source exceeded `limits.max_source_bytes`.
    SourceTooLarge,
    /// The last attempt (or the job deadline) ran out of time.
    Timeout,
    /// Every variant ran without producing a resolvable output.
    ToolFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Workspace => "workspace",
            FailureKind::SourceTooLarge => "source too large",
            FailureKind::Timeout => "timeout",
            FailureKind::ToolFailure => "tool failure",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_policy_parses_aliases() {
        assert_eq!("off".parse::<ScanPolicy>(), Ok(ScanPolicy::Disabled));
        assert_eq!(" Anchored ".parse::<ScanPolicy>(), Ok(ScanPolicy::AnchoredOnly));
        assert_eq!("unanchored".parse::<ScanPolicy>(), Ok(ScanPolicy::AllowUnanchored));
        assert!("sometimes".parse::<ScanPolicy>().is_err());
    }

    #[test]
    fn only_disabled_skips_scanning() {
        assert!(!ScanPolicy::Disabled.scans());
        assert!(ScanPolicy::AnchoredOnly.scans());
        assert!(ScanPolicy::AllowUnanchored.scans());
    }
}
