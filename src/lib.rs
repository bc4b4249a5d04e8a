// src/lib.rs

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod resolve;
pub mod types;
pub mod variants;
pub mod workspace;

pub use config::RunnerConfig;
pub use engine::{JobRequest, JobResult, JobRunner};
pub use errors::RunnerError;
pub use types::{FailureKind, ScanPolicy};
pub use variants::{Module, Selection};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::cli::{BatchArgs, CliArgs, Command, RunArgs};
use crate::config::{default_config_path, load_and_validate, RawConfig};
use crate::engine::{CooldownStatus, CooldownTable, RunnerStats};
use crate::variants::catalog::{self, Stability, PRESETS};
use crate::workspace::RequestIdentity;

/// High-level entry point used by `main.rs`.
///
/// Returns `Ok(false)` when at least one job failed, so the binary can exit
/// non-zero without treating that as an internal error.
pub async fn run(args: CliArgs) -> Result<bool> {
    match args.command {
        Command::Presets => {
            print_presets();
            Ok(true)
        }
        Command::Modules => {
            print_modules();
            Ok(true)
        }
        Command::Run(run_args) => {
            let cfg = load_config(&args.config)?;
            run_single(cfg, run_args).await
        }
        Command::Batch(batch_args) => {
            let cfg = load_config(&args.config)?;
            run_batch(cfg, batch_args).await
        }
    }
}

/// Load the config at `path`.
///
/// A missing file at the default location falls back to built-in defaults;
/// an explicitly named file must exist.
fn load_config(path: &str) -> Result<RunnerConfig> {
    let path = PathBuf::from(path);
    if path == default_config_path() && !path.exists() {
        info!(path = %path.display(), "config file not found; using built-in defaults");
        return RunnerConfig::try_from(RawConfig::default()).context("validating default config");
    }
    load_and_validate(&path).with_context(|| format!("loading config {}", path.display()))
}

fn selection_for(preset: Option<String>, modules: Vec<Module>, cfg: &RunnerConfig) -> Selection {
    if !modules.is_empty() {
        Selection::modules(modules)
    } else {
        Selection::preset(preset.unwrap_or_else(|| cfg.default_preset.clone()))
    }
}

async fn run_single(cfg: RunnerConfig, args: RunArgs) -> Result<bool> {
    let selection = selection_for(args.preset, args.modules, &cfg);
    let runner = JobRunner::new(cfg);

    if args.dry_run {
        print_plan(&runner, &selection);
        return Ok(true);
    }

    let source = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;

    let mut request = JobRequest::new(source, selection).with_diagnostics(args.diagnostics);
    if let Some(deadline) = args.deadline {
        request = request.with_deadline(deadline);
    }

    let result = runner.submit(request).await;

    if let Some(diag) = result.diagnostics() {
        eprintln!("{diag}");
    }

    if let JobResult::Success {
        transformed_text, ..
    } = &result
    {
        match &args.output {
            Some(out) => tokio::fs::write(out, transformed_text)
                .await
                .with_context(|| format!("writing {}", out.display()))?,
            None if !args.json => print!("{transformed_text}"),
            None => {}
        }
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("serialising result")?
        );
    }

    eprintln!("{}", summary_line(&result));
    Ok(result.is_success())
}

async fn run_batch(cfg: RunnerConfig, args: BatchArgs) -> Result<bool> {
    let selection = selection_for(args.preset, Vec::new(), &cfg);
    let cooldown = CooldownTable::from_config(&cfg.cooldown);
    let stats = RunnerStats::new();
    let naming = cfg.naming.clone();
    let runner = JobRunner::new(cfg);

    if let Some(dir) = &args.out_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut all_ok = true;
    let mut jobs = JoinSet::new();
    for (idx, file) in args.files.into_iter().enumerate() {
        if let Some(user) = &args.user {
            if let CooldownStatus::Wait(remaining) = cooldown.try_acquire(user) {
                println!(
                    "skip  {}: cooldown for '{user}', wait {}s",
                    file.display(),
                    remaining.as_secs().max(1)
                );
                all_ok = false;
                continue;
            }
        }

        let runner = runner.clone();
        let selection = selection.clone();
        jobs.spawn(async move {
            let outcome = match tokio::fs::read_to_string(&file).await {
                Ok(source) => Ok(runner.submit(JobRequest::new(source, selection)).await),
                Err(e) => Err(format!("cannot read: {e}")),
            };
            (idx, file, outcome)
        });
    }

    let mut finished = Vec::new();
    while let Some(joined) = jobs.join_next().await {
        finished.push(joined.context("batch job panicked")?);
    }
    finished.sort_by_key(|(idx, _, _)| *idx);

    for (_, file, outcome) in finished {
        let result = match outcome {
            Ok(result) => result,
            Err(msg) => {
                println!("error {}: {msg}", file.display());
                all_ok = false;
                continue;
            }
        };
        stats.record(&result);
        all_ok &= result.is_success();

        if let (Some(dir), JobResult::Success { transformed_text, .. }) = (&args.out_dir, &result) {
            let out = dir.join(naming.output_file_name(&file_stem(&file)));
            tokio::fs::write(&out, transformed_text)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            debug!(path = %out.display(), "wrote batch output");
        }

        let tag = if result.is_success() { "ok   " } else { "fail " };
        println!("{tag} {}: {}", file.display(), summary_line(&result));
    }

    let snap = stats.snapshot();
    println!(
        "total {}, succeeded {}, failed {} ({:.1}% success)",
        snap.total,
        snap.succeeded,
        snap.failed,
        snap.success_rate()
    );
    Ok(all_ok)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

fn summary_line(result: &JobResult) -> String {
    match result {
        JobResult::Success {
            elapsed,
            original_size,
            transformed_size,
            attempts,
            ambiguous,
            ..
        } => {
            let growth = result
                .growth_percent()
                .map(|g| format!(" ({g:+.1}%)"))
                .unwrap_or_default();
            let warning = if *ambiguous {
                " [output attribution ambiguous]"
            } else {
                ""
            };
            format!(
                "done in {:.2}s: {original_size} -> {transformed_size} bytes{growth}, {attempts} attempt(s){warning}",
                elapsed.as_secs_f64()
            )
        }
        JobResult::Failure {
            kind,
            error_message,
            attempts,
            ..
        } => format!("failed ({kind}) after {attempts} attempt(s): {error_message}"),
    }
}

/// Print the variants a job would try, without executing anything.
fn print_plan(runner: &JobRunner, selection: &Selection) {
    let cfg = runner.config();
    let placeholder = cfg
        .upload_dir
        .join(cfg.naming.input_file_name(&RequestIdentity::generate()));
    let plan = runner.plan(selection, &placeholder);

    println!("hercules-runner dry-run");
    println!("  selection = {selection}");
    println!("  working_dir = {}", cfg.tool.working_dir.display());
    println!("  attempt_timeout = {:?}", cfg.limits.attempt_timeout);
    println!("  scan = {:?}", cfg.scan);
    println!();
    println!("variants ({}):", plan.len());
    for (i, variant) in plan.iter().enumerate() {
        println!("  {}. [{:?}] {variant}", i + 1, variant.kind());
    }
    debug!("dry-run complete (no execution)");
}

fn print_presets() {
    println!("presets ({}):", PRESETS.len());
    for preset in PRESETS.iter() {
        let native = preset.native_flag.unwrap_or("-");
        let modules: Vec<&str> = preset.modules.iter().map(|m| m.name()).collect();
        println!("  {:<5} {:<6} {}", preset.name, native, preset.description);
        println!("        modules: {}", modules.join(", "));
    }
    println!();
    println!("least invasive: {}", catalog::least_invasive().name);
}

fn print_modules() {
    for stability in [Stability::Stable, Stability::MayConflict, Stability::Advanced] {
        println!("{stability}:");
        for module in Module::ALL.iter().filter(|m| m.stability() == stability) {
            println!("  {:<18} {}", module.flag(), module.description());
        }
    }
}
