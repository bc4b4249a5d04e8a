use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: SystemTime },
    Dir(Vec<String>), // List of child names
}

/// In-memory filesystem for resolver and cleanup tests.
///
/// Files can be given explicit modification times so freshness checks are
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    /// Paths for which `remove_file` fails, to simulate permission errors.
    undeletable: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.add_file_with_mtime(path, content, SystemTime::now());
    }

    pub fn add_file_with_mtime(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        modified: SystemTime,
    ) {
        let path = path.as_ref().to_path_buf();
        let mut files = self.files.lock().unwrap();
        files.insert(
            path.clone(),
            MockEntry::File {
                content: content.into(),
                modified,
            },
        );

        if let Some(parent) = path.parent() {
            ensure_dir_entry(&mut files, parent);
            add_child(&mut files, parent, &path);
        }
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut files = self.files.lock().unwrap();
        ensure_dir_entry(&mut files, path.as_ref());
    }

    /// Make `remove_file` fail for this path.
    pub fn deny_removal(&self, path: impl AsRef<Path>) {
        self.undeletable
            .lock()
            .unwrap()
            .push(path.as_ref().to_path_buf());
    }

    /// All file paths currently present, sorted.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        let files = self.files.lock().unwrap();
        let mut out: Vec<PathBuf> = files
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::File { .. }))
            .map(|(p, _)| p.clone())
            .collect();
        out.sort();
        out
    }
}

fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if files.contains_key(path) {
        return;
    }
    files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = path.parent() {
        if parent != path && !parent.as_os_str().is_empty() {
            ensure_dir_entry(files, parent);
            add_child(files, parent, path);
        }
    }
}

fn add_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
    if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            if !children.iter().any(|c| c == name) {
                children.push(name.to_string());
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(MockEntry::File { content, .. }) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let files = self.files.lock().unwrap();
        let parent_ok = path
            .parent()
            .map(|p| matches!(files.get(p), Some(MockEntry::Dir(_))))
            .unwrap_or(false);
        drop(files);
        if !parent_ok {
            return Err(anyhow!("Parent directory missing: {:?}", path));
        }
        self.add_file(path, contents);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        if let Some(MockEntry::File { .. }) = files.get(path) {
            return Err(anyhow!("Not a directory: {:?}", path));
        }
        ensure_dir_entry(&mut files, path);
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(files.get(path), Some(MockEntry::File { .. }))
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            _ => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn remove_file(&self, path: &Path) -> Result<bool> {
        if self.undeletable.lock().unwrap().iter().any(|p| p == path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        let mut files = self.files.lock().unwrap();
        match files.get(path) {
            Some(MockEntry::File { .. }) => {
                files.remove(path);
                if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
                    if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
                        children.retain(|c| c.as_str() != name);
                    }
                }
                Ok(true)
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Ok(false),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_requires_parent_dir() {
        let fs = MockFileSystem::new();
        assert!(fs.write(Path::new("/up/a.lua"), b"x").is_err());

        fs.create_dir_all(Path::new("/up")).unwrap();
        fs.write(Path::new("/up/a.lua"), b"x").unwrap();
        assert_eq!(fs.read(Path::new("/up/a.lua")).unwrap(), b"x");
    }

    #[test]
    fn remove_updates_directory_listing() {
        let fs = MockFileSystem::new();
        fs.add_file("/root/a.lua", "a");
        fs.add_file("/root/b.lua", "b");

        assert!(fs.remove_file(Path::new("/root/a.lua")).unwrap());
        assert!(!fs.remove_file(Path::new("/root/a.lua")).unwrap());
        assert_eq!(
            fs.read_dir(Path::new("/root")).unwrap(),
            vec![PathBuf::from("/root/b.lua")]
        );
    }

    #[test]
    fn denied_removal_errors() {
        let fs = MockFileSystem::new();
        fs.add_file("/root/locked.lua", "a");
        fs.deny_removal("/root/locked.lua");
        assert!(fs.remove_file(Path::new("/root/locked.lua")).is_err());
        assert!(fs.is_file(Path::new("/root/locked.lua")));
    }
}
