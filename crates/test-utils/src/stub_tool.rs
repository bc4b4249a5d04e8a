//! A shell script standing in for the obfuscator.
//!
//! The runner invokes it as `sh <script> <input> [flags...]` with the tool
//! directory as cwd, exactly like the real `lua hercules.lua ...` call. Every
//! behaviour rejects an empty input the way the real tool does.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempDir;

use hercules_runner::config::RunnerConfig;

use crate::builders::RunnerConfigBuilder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubBehaviour {
    /// Writes `<stem>_obfuscated.lua` next to the input.
    SiblingOutput,
    /// Writes `<stem>_obfuscated.lua` into its working directory.
    CwdOutput,
    /// Starts a background `sleep`, records both pids, then waits forever.
    Hang,
    /// Exits 2 when the given flag is present; otherwise like `SiblingOutput`.
    FailOnFlag(String),
    /// Writes `script_obfuscated.lua` into its working directory, ignoring
    /// the input's name.
    AgnosticOutput,
    /// Prints a colourised error on stderr and exits 1 without output.
    AnsiError,
}

/// Scratch layout plus the stub script.
///
/// ```text
/// <tmp>/bin/hercules_stub.sh
/// <tmp>/tool/       working directory, first search root
/// <tmp>/uploads/    input artifacts
/// <tmp>/outputs/    extra search root
/// ```
pub struct StubTool {
    _root: TempDir,
    script: PathBuf,
    tool_dir: PathBuf,
    upload_dir: PathBuf,
    outputs_dir: PathBuf,
}

impl StubTool {
    pub fn new(behaviour: StubBehaviour) -> Result<Self> {
        Self::build(behaviour, None)
    }

    /// Like [`StubTool::new`], but the script sleeps for `delay` first.
    pub fn with_delay(behaviour: StubBehaviour, delay: Duration) -> Result<Self> {
        Self::build(behaviour, Some(delay))
    }

    fn build(behaviour: StubBehaviour, delay: Option<Duration>) -> Result<Self> {
        let root = tempfile::tempdir().context("creating stub tempdir")?;
        let bin = root.path().join("bin");
        let tool_dir = root.path().join("tool");
        let upload_dir = root.path().join("uploads");
        let outputs_dir = root.path().join("outputs");
        for dir in [&bin, &tool_dir, &upload_dir, &outputs_dir] {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }

        let script = bin.join("hercules_stub.sh");
        std::fs::write(&script, render_script(&behaviour, delay))
            .with_context(|| format!("writing {}", script.display()))?;

        Ok(Self {
            _root: root,
            script,
            tool_dir,
            upload_dir,
            outputs_dir,
        })
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn tool_dir(&self) -> &Path {
        &self.tool_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    /// Config pointing at this stub, ready for further tweaks.
    pub fn config_builder(&self) -> RunnerConfigBuilder {
        RunnerConfigBuilder::new()
            .launchers(&["sh"])
            .entrypoint(self.script.to_string_lossy())
            .working_dir(&self.tool_dir)
            .upload_dir(&self.upload_dir)
            .search_roots(vec![self.outputs_dir.clone()])
            .attempt_timeout("10s")
    }

    pub fn config(&self) -> RunnerConfig {
        self.config_builder().build()
    }

    /// Pids written by [`StubBehaviour::Hang`] runs: the shell, then its
    /// background child.
    pub fn recorded_pids(&self) -> Vec<u32> {
        let mut pids = Vec::new();
        for path in list_files(&self.tool_dir) {
            let is_pid_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("pids-"));
            if !is_pid_file {
                continue;
            }
            if let Ok(text) = std::fs::read_to_string(&path) {
                pids.extend(text.split_whitespace().filter_map(|p| p.parse::<u32>().ok()));
            }
        }
        pids
    }

    /// Files the runner should have cleaned up but did not (inputs and
    /// outputs in any of the stub's directories). Pid files are ignored.
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        [&self.upload_dir, &self.tool_dir, &self.outputs_dir]
            .into_iter()
            .flat_map(|d| list_files(d))
            .filter(|p| {
                !p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("pids-"))
            })
            .collect()
    }
}

/// Whether `pid` is still a live (non-zombie) process. Linux only.
pub fn process_alive(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // Format: `pid (comm) state ...`; comm may contain spaces.
    match stat.rfind(')') {
        Some(idx) => !matches!(stat[idx + 1..].trim_start().chars().next(), Some('Z' | 'X')),
        None => false,
    }
}

/// Poll until none of `pids` is alive or `within` elapses.
pub async fn wait_all_dead(pids: &[u32], within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if pids.iter().all(|p| !process_alive(*p)) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

const PREAMBLE: &str = r#"#!/bin/sh
input="$1"
shift
if [ ! -s "$input" ]; then
  echo "error: input file is empty" >&2
  exit 1
fi
stem=$(basename "$input" .lua)
"#;

fn write_output(target: &str) -> String {
    format!(
        "out={target}\n{{ echo \"-- stub obfuscated [$*]\"; cat \"$input\"; }} > \"$out\"\necho \"wrote $out\"\n"
    )
}

fn render_script(behaviour: &StubBehaviour, delay: Option<Duration>) -> String {
    let mut script = PREAMBLE.to_string();
    if let Some(d) = delay {
        script.push_str(&format!("sleep {:.3}\n", d.as_secs_f64()));
    }

    let sibling = r#""$(dirname "$input")/${stem}_obfuscated.lua""#;
    match behaviour {
        StubBehaviour::SiblingOutput => script.push_str(&write_output(sibling)),
        StubBehaviour::CwdOutput => script.push_str(&write_output(r#""./${stem}_obfuscated.lua""#)),
        StubBehaviour::Hang => {
            script.push_str("sleep 300 &\necho \"$$ $!\" > \"pids-$stem-$$\"\nwait\n");
        }
        StubBehaviour::FailOnFlag(flag) => {
            script.push_str(&format!(
                "for a in \"$@\"; do\n  if [ \"$a\" = \"{flag}\" ]; then\n    echo \"error: unsupported option $a\" >&2\n    exit 2\n  fi\ndone\n"
            ));
            script.push_str(&write_output(sibling));
        }
        StubBehaviour::AgnosticOutput => {
            script.push_str(&write_output(r#""./script_obfuscated.lua""#));
        }
        StubBehaviour::AnsiError => {
            script.push_str("printf '\\033[1;31merror:\\033[0m cannot parse input\\n' >&2\nexit 1\n");
        }
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_always_reject_empty_input() {
        for b in [
            StubBehaviour::SiblingOutput,
            StubBehaviour::Hang,
            StubBehaviour::AnsiError,
        ] {
            assert!(render_script(&b, None).contains("input file is empty"));
        }
    }

    #[test]
    fn delay_is_rendered_in_seconds() {
        let s = render_script(&StubBehaviour::CwdOutput, Some(Duration::from_millis(250)));
        assert!(s.contains("sleep 0.250\n"));
    }
}
