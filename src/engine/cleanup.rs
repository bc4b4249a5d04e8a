// src/engine/cleanup.rs

//! Request-scoped artifact cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::workspace::RequestIdentity;

/// RAII guard over the files one job may leave behind.
///
/// It owns the input artifact, any output the runner adopted after reading
/// it, and the identity-derived output candidates. Nothing else is ever
/// deleted. Release happens explicitly or on drop, which covers early
/// returns, panics and a cancelled `submit` future.
#[derive(Debug)]
pub struct ArtifactGuard {
    fs: Arc<dyn FileSystem>,
    identity: RequestIdentity,
    input: PathBuf,
    candidates: Vec<PathBuf>,
    adopted: Option<PathBuf>,
    released: bool,
}

impl ArtifactGuard {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        identity: RequestIdentity,
        input: PathBuf,
        candidates: Vec<PathBuf>,
    ) -> Self {
        Self {
            fs,
            identity,
            input,
            candidates,
            adopted: None,
            released: false,
        }
    }

    /// Register a resolved output. Call only once its bytes are in memory.
    pub fn adopt_output(&mut self, path: PathBuf) {
        debug!(job = %self.identity, path = %path.display(), "adopting output for cleanup");
        self.adopted = Some(path);
    }

    /// Remove identity-derived outputs left by an earlier attempt.
    ///
    /// Returns the number of files removed.
    pub fn sweep_stale_outputs(&self) -> usize {
        self.candidates
            .iter()
            .filter(|p| remove_logged(self.fs.as_ref(), &self.identity, p, "stale output"))
            .count()
    }

    /// Delete everything this guard owns. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        remove_logged(self.fs.as_ref(), &self.identity, &self.input, "input");
        if let Some(out) = self.adopted.take() {
            remove_logged(self.fs.as_ref(), &self.identity, &out, "output");
        }
        for candidate in &self.candidates {
            remove_logged(self.fs.as_ref(), &self.identity, candidate, "late output");
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if !self.released {
            debug!(job = %self.identity, "artifact guard dropped before release; cleaning up");
        }
        self.release();
    }
}

/// Missing files count as removed-already. Returns whether a file was deleted.
fn remove_logged(fs: &dyn FileSystem, identity: &RequestIdentity, path: &Path, what: &str) -> bool {
    match fs.remove_file(path) {
        Ok(removed) => {
            if removed {
                debug!(job = %identity, path = %path.display(), what, "removed");
            }
            removed
        }
        Err(e) => {
            warn!(
                job = %identity,
                path = %path.display(),
                what,
                error = %e,
                "failed to remove artifact"
            );
            false
        }
    }
}
