// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::parse_duration;
use crate::variants::Module;

/// Command-line arguments for `hercules-runner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hercules-runner",
    version,
    about = "Run Lua sources through the Hercules obfuscator with retries, deadlines and cleanup.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Runner.toml` in the current working directory. When the
    /// default file is absent, built-in defaults are used.
    #[arg(long, global = true, value_name = "PATH", default_value = "Runner.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HERCULES_RUNNER_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Obfuscate one file.
    Run(RunArgs),
    /// Obfuscate several files concurrently.
    Batch(BatchArgs),
    /// List the preset catalog.
    Presets,
    /// List the module catalog.
    Modules,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Source file to transform.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Preset name (see `presets`). Defaults to `[variants].default_preset`.
    #[arg(long, value_name = "NAME", conflicts_with = "modules")]
    pub preset: Option<String>,

    /// Enable a module; repeat for several (see `modules`).
    #[arg(long = "module", value_name = "NAME", value_parser = parse_module)]
    pub modules: Vec<Module>,

    /// Print the per-job transcript to stderr.
    #[arg(long)]
    pub diagnostics: bool,

    /// Overall job deadline, e.g. `30s` or `2m`.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub deadline: Option<Duration>,

    /// Write the transformed text here instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print the whole result as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Print the invocation variants that would be tried, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    /// Source files to transform.
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Preset name applied to every file.
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Caller id; gates each file through the cooldown table.
    #[arg(long, value_name = "ID")]
    pub user: Option<String>,

    /// Directory for transformed files (`<stem><suffix>.<ext>`). Without it
    /// results are only summarised.
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_module(s: &str) -> Result<Module, String> {
    s.parse()
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    match parse_duration(s)? {
        d if d.is_zero() => Err("deadline must be greater than zero".to_string()),
        d => Ok(d),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_modules() {
        let args = CliArgs::try_parse_from([
            "hercules-runner",
            "run",
            "a.lua",
            "--module",
            "vm",
            "--module",
            "Compressor",
            "--deadline",
            "30s",
        ])
        .unwrap();
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.modules, vec![Module::Vm, Module::Compressor]);
        assert_eq!(run.deadline, Some(Duration::from_secs(30)));
        assert_eq!(args.config, "Runner.toml");
    }

    #[test]
    fn preset_and_modules_conflict() {
        let res = CliArgs::try_parse_from([
            "hercules-runner",
            "run",
            "a.lua",
            "--preset",
            "min",
            "--module",
            "vm",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn unknown_module_is_rejected() {
        let res = CliArgs::try_parse_from(["hercules-runner", "run", "a.lua", "--module", "nope"]);
        assert!(res.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args =
            CliArgs::try_parse_from(["hercules-runner", "presets", "--log-level", "debug"]).unwrap();
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(matches!(args.command, Command::Presets));
    }
}
