// src/fs/mod.rs

//! Filesystem seam for file expansion, the built-in tools and the content
//! hash cache. Production code uses [`RealFileSystem`]; unit tests use
//! the in-memory `mock::MockFileSystem`.

use std::fmt::Debug;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

#[cfg(test)]
pub mod mock;

pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Streaming reader, used for hashing.
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    /// Replace `path` with `contents`, creating parent directories.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Remove a file, or a directory with everything below it.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Full paths of the entries of `path`, sorted.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
}

/// `std::fs` backed implementation.
///
/// Writes go through a sibling temporary file and a rename, so a watcher or
/// a LiveReload client never observes a half-written stylesheet.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl RealFileSystem {
    fn temp_sibling(path: &Path) -> Result<PathBuf> {
        let Some(name) = path.file_name() else {
            bail!("cannot write to {:?}: no file name", path);
        };
        let mut tmp = name.to_os_string();
        tmp.push(format!(".buildwatch-{}.tmp", std::process::id()));
        Ok(path.with_file_name(tmp))
    }
}

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).with_context(|| format!("reading {:?}", path))?;
        String::from_utf8(bytes).with_context(|| format!("{:?} is not valid UTF-8", path))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(path).with_context(|| format!("opening {:?}", path))?;
        Ok(Box::new(file))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {:?}", parent))?,
            _ => {}
        }

        let tmp = Self::temp_sibling(path)?;
        let mut file = fs::File::create(&tmp).with_context(|| format!("creating {:?}", tmp))?;
        file.write_all(contents)
            .and_then(|()| file.sync_all())
            .with_context(|| format!("writing {:?}", tmp))?;
        drop(file);

        fs::rename(&tmp, path).with_context(|| format!("replacing {:?}", path))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let meta = fs::symlink_metadata(path).with_context(|| format!("inspecting {:?}", path))?;
        if meta.is_dir() {
            fs::remove_dir_all(path).with_context(|| format!("removing directory {:?}", path))
        } else {
            fs::remove_file(path).with_context(|| format!("removing {:?}", path))
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)
            .with_context(|| format!("listing {:?}", path))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("listing {:?}", path))?;
        entries.sort();
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_file(&self, path: &Path) -> bool {
        fs::metadata(path).is_ok_and(|m| m.is_file())
    }

    fn is_dir(&self, path: &Path) -> bool {
        fs::metadata(path).is_ok_and(|m| m.is_dir())
    }
}
