// src/resolve/scan.rs

//! Last-resort directory scan for output files.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::types::ScanPolicy;
use crate::workspace::{NamingConvention, RequestIdentity};

use super::{Anchoring, ResolvedOutput};

/// Matcher for file names following the output convention
/// (e.g. `*_obfuscated.lua`).
pub fn output_matcher(naming: &NamingConvention) -> Result<GlobMatcher> {
    let pattern = format!("*{}", naming.output_tail());
    let glob = GlobBuilder::new(&pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("building output glob {pattern:?}"))?;
    Ok(glob.compile_matcher())
}

/// Scan `roots` for output-convention files.
///
/// A name embedding the identity wins, in root order. Without one, and only
/// under [`ScanPolicy::AllowUnanchored`], the newest match modified at or
/// after `job_started` is accepted and tagged [`Anchoring::ScanUnanchored`].
/// Matches whose freshness cannot be established are rejected, and so are
/// names carrying another job's identity: those belong to that job.
pub fn scan_roots(
    fs: &dyn FileSystem,
    identity: &RequestIdentity,
    roots: &[PathBuf],
    matcher: &GlobMatcher,
    policy: ScanPolicy,
    job_started: SystemTime,
) -> Option<ResolvedOutput> {
    if !policy.scans() {
        return None;
    }

    let id = identity.to_string();
    let mut unanchored: Vec<PathBuf> = Vec::new();

    for root in roots {
        for path in matching_files(fs, root, matcher) {
            let name = file_name(&path);
            if name.contains(&id) {
                debug!(job = %identity, path = %path.display(), "scan found identity-anchored output");
                return Some(ResolvedOutput {
                    path,
                    anchoring: Anchoring::ScanAnchored,
                });
            }
            if let Some(owner) = foreign_identity(name, identity) {
                debug!(
                    job = %identity,
                    owner = %owner,
                    path = %path.display(),
                    "skipping output named for another job"
                );
                continue;
            }
            unanchored.push(path);
        }
    }

    if policy != ScanPolicy::AllowUnanchored {
        if !unanchored.is_empty() {
            debug!(
                job = %identity,
                count = unanchored.len(),
                "ignoring output files without this job's identity"
            );
        }
        return None;
    }

    let mut freshest: Option<(PathBuf, SystemTime)> = None;
    for path in unanchored {
        match fs.modified(&path) {
            Ok(mtime) if mtime >= job_started => {
                if freshest.as_ref().map_or(true, |(_, best)| mtime > *best) {
                    freshest = Some((path, mtime));
                }
            }
            Ok(_) => {
                debug!(job = %identity, path = %path.display(), "rejecting stale unanchored output");
            }
            Err(e) => {
                debug!(
                    job = %identity,
                    path = %path.display(),
                    error = %e,
                    "rejecting unanchored output with unknown mtime"
                );
            }
        }
    }

    freshest.map(|(path, _)| {
        warn!(
            job = %identity,
            path = %path.display(),
            "accepting output without identity anchor; it may belong to a concurrent job"
        );
        ResolvedOutput {
            path,
            anchoring: Anchoring::ScanUnanchored,
        }
    })
}

fn matching_files(fs: &dyn FileSystem, root: &Path, matcher: &GlobMatcher) -> Vec<PathBuf> {
    let mut entries = match fs.read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(root = %root.display(), error = %e, "search root not listable; skipping");
            return Vec::new();
        }
    };
    entries.sort();
    entries.retain(|p| matcher.is_match(file_name(p)) && fs.is_file(p));
    entries
}

fn foreign_identity(name: &str, identity: &RequestIdentity) -> Option<RequestIdentity> {
    RequestIdentity::find_all(name)
        .into_iter()
        .find(|found| found != identity)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}
