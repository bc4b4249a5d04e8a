// src/resolve/mod.rs

//! Output resolution.
//!
//! The external tool has no output-path parameter, so after each attempt the
//! runner has to find where (if anywhere) the result landed. Probes run in a
//! fixed order and the first hit wins:
//!
//! 1. the sibling of the input file (`<upload>/<id>_obfuscated.lua`);
//! 2. `<root>/<id>_obfuscated.lua` for each search root;
//! 3. a directory scan of each search root, gated by [`ScanPolicy`].
//!
//! Probes 1 and 2 are anchored by the request identity and cannot pick up
//! another job's file. Probe 3 can, when the policy allows unanchored matches:
//! two jobs whose tool writes an identity-agnostic name into the same
//! directory may swap results. That case is reported as
//! [`Anchoring::ScanUnanchored`].

pub mod scan;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::types::ScanPolicy;
use crate::workspace::{NamingConvention, RequestIdentity};

/// How a resolved output was tied to its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchoring {
    Sibling,
    IdentityName,
    ScanAnchored,
    /// Found by scan without the identity in its name. Ambiguous.
    ScanUnanchored,
}

impl Anchoring {
    pub fn is_ambiguous(self) -> bool {
        matches!(self, Anchoring::ScanUnanchored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub path: PathBuf,
    pub anchoring: Anchoring,
}

/// Everything the resolver needs to know about one job.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub identity: &'a RequestIdentity,
    pub input_path: &'a Path,
    pub search_roots: &'a [PathBuf],
    pub naming: &'a NamingConvention,
    pub policy: ScanPolicy,
    pub job_started: SystemTime,
}

/// The deterministic, identity-derived candidate paths (probes 1 and 2), in
/// probe order and without duplicates.
pub fn identity_candidates(
    identity: &RequestIdentity,
    input_path: &Path,
    search_roots: &[PathBuf],
    naming: &NamingConvention,
) -> Vec<PathBuf> {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| identity.to_string());

    let mut candidates = vec![input_path.with_file_name(naming.output_file_name(&stem))];
    let id_name = naming.output_file_name(&identity.to_string());
    for root in search_roots {
        let candidate = root.join(&id_name);
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Locate this job's output. `None` means "not found", not an error.
pub fn resolve(fs: &dyn FileSystem, req: &ResolveRequest<'_>) -> Option<ResolvedOutput> {
    let candidates = identity_candidates(req.identity, req.input_path, req.search_roots, req.naming);
    for (idx, path) in candidates.into_iter().enumerate() {
        if fs.is_file(&path) {
            let anchoring = if idx == 0 {
                Anchoring::Sibling
            } else {
                Anchoring::IdentityName
            };
            debug!(job = %req.identity, path = %path.display(), ?anchoring, "output resolved");
            return Some(ResolvedOutput { path, anchoring });
        }
    }

    if !req.policy.scans() {
        return None;
    }

    let matcher = match scan::output_matcher(req.naming) {
        Ok(m) => m,
        Err(e) => {
            warn!(job = %req.identity, error = %e, "cannot build output matcher; skipping scan");
            return None;
        }
    };

    scan::scan_roots(
        fs,
        req.identity,
        req.search_roots,
        &matcher,
        req.policy,
        req.job_started,
    )
}
