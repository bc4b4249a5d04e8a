// src/workspace/mod.rs

//! Request identities and input artifacts.
//!
//! Every job gets a fresh [`RequestIdentity`]. The identity names the input
//! file in the shared upload directory and is the anchor the output resolver
//! and cleanup guard rely on, so two jobs never touch each other's inputs.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{Result, RunnerError};
use crate::fs::FileSystem;

/// Opaque, process-unique token for one job (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestIdentity(Uuid);

impl RequestIdentity {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Every hyphenated UUID embedded in `text`, in order of appearance.
    pub fn find_all(text: &str) -> Vec<RequestIdentity> {
        const LEN: usize = 36;
        let bytes = text.as_bytes();
        let mut found = Vec::new();
        let mut start = 0;
        while start + LEN <= bytes.len() {
            let window = &bytes[start..start + LEN];
            let hyphenated = [8, 13, 18, 23].iter().all(|&i| window[i] == b'-');
            let parsed = hyphenated
                .then(|| std::str::from_utf8(window).ok())
                .flatten()
                .and_then(|w| Uuid::parse_str(w).ok());
            match parsed {
                Some(uuid) => {
                    found.push(Self(uuid));
                    start += LEN;
                }
                None => start += 1,
            }
        }
        found
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// The tool's file naming convention: `<stem>.<ext>` in,
/// `<stem><suffix>.<ext>` out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConvention {
    extension: String,
    output_suffix: String,
}

impl NamingConvention {
    pub fn new(extension: impl Into<String>, output_suffix: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            output_suffix: output_suffix.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn output_suffix(&self) -> &str {
        &self.output_suffix
    }

    pub fn input_file_name(&self, identity: &RequestIdentity) -> String {
        format!("{identity}.{}", self.extension)
    }

    /// Output file name for a given input stem.
    pub fn output_file_name(&self, stem: &str) -> String {
        format!("{stem}{}.{}", self.output_suffix, self.extension)
    }

    /// Trailing part every output name ends with (e.g. `_obfuscated.lua`).
    pub fn output_tail(&self) -> String {
        format!("{}.{}", self.output_suffix, self.extension)
    }
}

/// The job's source text persisted for the tool to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputArtifact {
    path: PathBuf,
    size: usize,
}

impl InputArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Create a fresh identity and write `source` to
/// `<upload_dir>/<identity>.<ext>`.
///
/// No locking: the identity alone keeps concurrent inputs apart.
pub fn allocate(
    fs: &dyn FileSystem,
    upload_dir: &Path,
    naming: &NamingConvention,
    source: &str,
) -> Result<(RequestIdentity, InputArtifact)> {
    let identity = RequestIdentity::generate();

    fs.create_dir_all(upload_dir).map_err(|e| {
        RunnerError::Workspace(format!(
            "cannot create upload dir {}: {e:#}",
            upload_dir.display()
        ))
    })?;

    let path = upload_dir.join(naming.input_file_name(&identity));
    fs.write(&path, source.as_bytes()).map_err(|e| {
        RunnerError::Workspace(format!("cannot write input {}: {e:#}", path.display()))
    })?;

    debug!(job = %identity, path = %path.display(), bytes = source.len(), "input artifact written");

    Ok((
        identity,
        InputArtifact {
            path,
            size: source.len(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn naming() -> NamingConvention {
        NamingConvention::new("lua", "_obfuscated")
    }

    #[test]
    fn identities_are_unique() {
        let ids: HashSet<RequestIdentity> = (0..1000).map(|_| RequestIdentity::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn find_all_picks_embedded_identities() {
        let a = RequestIdentity::generate();
        let b = RequestIdentity::generate();
        let name = format!("out-{a}-{b}_obfuscated.lua");
        assert_eq!(RequestIdentity::find_all(&name), vec![a, b]);

        assert!(RequestIdentity::find_all("script_obfuscated.lua").is_empty());
        assert!(RequestIdentity::find_all("0123456789abcdef0123456789abcdef0123").is_empty());
        assert!(RequestIdentity::find_all("é").is_empty());
    }

    #[test]
    fn naming_convention_builds_names() {
        let n = naming();
        assert_eq!(n.output_file_name("abc"), "abc_obfuscated.lua");
        assert_eq!(n.output_tail(), "_obfuscated.lua");
    }

    #[test]
    fn allocate_writes_source_verbatim() {
        let fs = MockFileSystem::new();
        let (identity, input) =
            allocate(&fs, Path::new("/uploads"), &naming(), "print(1)").unwrap();

        assert_eq!(
            input.path(),
            Path::new("/uploads").join(format!("{identity}.lua"))
        );
        assert_eq!(input.size(), 8);
        assert_eq!(fs.read(input.path()).unwrap(), b"print(1)");
    }

    #[test]
    fn empty_source_is_a_valid_write() {
        let fs = MockFileSystem::new();
        let (_, input) = allocate(&fs, Path::new("/uploads"), &naming(), "").unwrap();
        assert_eq!(input.size(), 0);
        assert!(fs.is_file(input.path()));
    }

    #[test]
    fn upload_dir_failure_is_workspace_error() {
        let fs = MockFileSystem::new();
        // A file where the directory should be.
        fs.add_file("/uploads", "not a dir");

        match allocate(&fs, Path::new("/uploads"), &naming(), "x") {
            Err(RunnerError::Workspace(msg)) => assert!(msg.contains("/uploads")),
            other => panic!("expected workspace error, got {other:?}"),
        }
    }
}
