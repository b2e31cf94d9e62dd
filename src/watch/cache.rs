// src/watch/cache.rs

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Last seen content hash per file, for `skip_unchanged`.
#[derive(Debug)]
pub struct FileCache {
    fs: Arc<dyn FileSystem>,
    hashes: HashMap<PathBuf, String>,
}

impl FileCache {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            hashes: HashMap::new(),
        }
    }

    /// Record the current hash of `path` without reporting a change.
    pub fn prime(&mut self, path: &Path) -> Result<()> {
        let hash = compute_file_hash(self.fs.as_ref(), path)?;
        self.hashes.insert(path.to_path_buf(), hash);
        Ok(())
    }

    /// Whether `path` differs from the last recorded state, updating it.
    ///
    /// A file that disappeared counts as changed (once).
    pub fn changed(&mut self, path: &Path) -> Result<bool> {
        if !self.fs.is_file(path) {
            return Ok(self.hashes.remove(path).is_some() || !self.fs.exists(path));
        }

        let hash = compute_file_hash(self.fs.as_ref(), path)?;
        match self.hashes.insert(path.to_path_buf(), hash.clone()) {
            Some(old) if old == hash => {
                debug!(?path, "content unchanged");
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// blake3 hex digest of a file's contents.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn identical_rewrite_is_not_a_change() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("./a.less", "a {}");
        let mut cache = FileCache::new(fs.clone());
        cache.prime(Path::new("./a.less")).unwrap();

        fs.add_file("./a.less", "a {}");
        assert!(!cache.changed(Path::new("./a.less")).unwrap());

        fs.add_file("./a.less", "a { color: red }");
        assert!(cache.changed(Path::new("./a.less")).unwrap());
        assert!(!cache.changed(Path::new("./a.less")).unwrap());
    }

    #[test]
    fn unseen_and_deleted_files_are_changes() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("./b.js", "b");
        let mut cache = FileCache::new(fs.clone());
        assert!(cache.changed(Path::new("./b.js")).unwrap());

        fs.remove(Path::new("./b.js")).unwrap();
        assert!(cache.changed(Path::new("./b.js")).unwrap());
        assert!(cache.is_empty());
    }
}
