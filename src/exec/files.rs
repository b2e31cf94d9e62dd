// src/exec/files.rs

//! Expansion of declarative [`FileGroup`]s into concrete source/destination
//! mappings.
//!
//! Patterns are globs relative to the project root (or to the group's `cwd`).
//! `*` does not cross `/`; `**` does. A leading `!` excludes matches of the
//! other patterns in the same group. Literal patterns that do not exist are
//! dropped with a warning rather than failing the task.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

use crate::config::FileGroup;
use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;

/// What kind of filesystem entries a pattern may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Regular files only (compilers, concatenation, linters).
    Files,
    /// Files and directories (`clean`).
    Any,
}

/// A concrete set of sources and an optional destination, all relative to the
/// project root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMapping {
    pub src: Vec<PathBuf>,
    pub dest: Option<PathBuf>,
}

/// Whether a pattern contains glob metacharacters.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Expand every group into mappings, in order.
pub fn expand_files(
    fs: &dyn FileSystem,
    root: &Path,
    groups: &[FileGroup],
    kind: MatchKind,
) -> Result<Vec<FileMapping>> {
    let mut mappings = Vec::new();

    for group in groups {
        let base = group
            .cwd
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_default();
        let matched = match_patterns(fs, root, &base, &group.src, kind)?;

        if group.expand {
            let dest_dir = group.dest.as_deref().map(PathBuf::from).unwrap_or_default();
            for rel in matched {
                let dest = expanded_dest(&dest_dir, &rel, group.flatten, group.ext.as_deref());
                mappings.push(FileMapping {
                    src: vec![base.join(&rel)],
                    dest: Some(dest),
                });
            }
            continue;
        }

        let src: Vec<PathBuf> = matched.iter().map(|rel| base.join(rel)).collect();
        if src.is_empty() && group.dest.is_none() {
            continue;
        }
        mappings.push(FileMapping {
            src,
            dest: group.dest.as_deref().map(PathBuf::from),
        });
    }

    Ok(mappings)
}

/// All sources of all mappings, flattened in order.
pub fn all_sources(mappings: &[FileMapping]) -> Vec<PathBuf> {
    mappings.iter().flat_map(|m| m.src.iter().cloned()).collect()
}

/// Render a root-relative path with forward slashes.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn expanded_dest(dest_dir: &Path, rel: &Path, flatten: bool, ext: Option<&str>) -> PathBuf {
    let mut rel = if flatten {
        rel.file_name().map(PathBuf::from).unwrap_or_default()
    } else {
        rel.to_path_buf()
    };

    if let Some(ext) = ext {
        if let Some(name) = rel.file_name().and_then(|n| n.to_str()) {
            let stem = name.split('.').next().unwrap_or(name);
            rel.set_file_name(format!("{stem}{ext}"));
        }
    }

    dest_dir.join(rel)
}

/// Match `patterns` below `root/base` and return paths relative to `base`,
/// de-duplicated, in pattern order (sorted within each pattern).
fn match_patterns(
    fs: &dyn FileSystem,
    root: &Path,
    base: &Path,
    patterns: &[String],
    kind: MatchKind,
) -> Result<Vec<PathBuf>> {
    let (excludes, includes): (Vec<&String>, Vec<&String>) =
        patterns.iter().partition(|p| p.starts_with('!'));

    let exclude_set = build_exclude_set(&excludes)?;
    let abs_base = root.join(base);
    let mut out: Vec<PathBuf> = Vec::new();

    for pattern in includes {
        let pattern = pattern.as_str();
        let mut found = if is_glob(pattern) {
            walk_glob(fs, &abs_base, pattern, kind)?
        } else {
            let candidate = abs_base.join(pattern);
            let ok = match kind {
                MatchKind::Files => fs.is_file(&candidate),
                MatchKind::Any => fs.exists(&candidate),
            };
            if ok {
                vec![PathBuf::from(pattern)]
            } else {
                warn!(
                    path = %display_path(&base.join(pattern)),
                    "source file not found; skipping"
                );
                Vec::new()
            }
        };
        found.sort();

        for rel in found {
            let rel_str = display_path(&rel);
            if exclude_set.as_ref().is_some_and(|set| set.is_match(&rel_str)) {
                continue;
            }
            if !out.contains(&rel) {
                out.push(rel);
            }
        }
    }

    debug!(base = %display_path(base), matched = out.len(), "expanded source patterns");
    Ok(out)
}

fn build_exclude_set(excludes: &[&String]) -> Result<Option<GlobSet>> {
    if excludes.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pat in excludes {
        let pat = &pat[1..];
        builder.add(compile_glob(pat)?);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| BuildError::config(format!("invalid exclude patterns: {e}")))
}

/// Compile a pattern where `*` does not cross `/`.
pub(crate) fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| BuildError::config(format!("invalid glob pattern '{pattern}': {e}")))
}

/// Directory components before the first one containing glob metacharacters.
fn literal_prefix(pattern: &str) -> (PathBuf, usize) {
    let parts: Vec<&str> = pattern.split('/').collect();
    let mut prefix = PathBuf::new();
    for (i, part) in parts.iter().enumerate() {
        if is_glob(part) || i == parts.len() - 1 {
            return (prefix, parts.len() - i);
        }
        prefix.push(part);
    }
    (prefix, 0)
}

fn walk_glob(
    fs: &dyn FileSystem,
    abs_base: &Path,
    pattern: &str,
    kind: MatchKind,
) -> Result<Vec<PathBuf>> {
    let matcher: GlobMatcher = compile_glob(pattern)?.compile_matcher();
    let (prefix, remaining) = literal_prefix(pattern);
    let max_depth = if pattern.contains("**") { None } else { Some(remaining) };

    let start = abs_base.join(&prefix);
    if !fs.is_dir(&start) {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    let mut stack = vec![(start, 0usize)];

    while let Some((dir, depth)) = stack.pop() {
        let entries = fs
            .read_dir(&dir)
            .map_err(|e| BuildError::Other(e.context(format!("walking {}", dir.display()))))?;
        for path in entries {
            let Ok(rel) = path.strip_prefix(abs_base) else {
                continue;
            };
            let rel = rel.to_path_buf();
            let is_dir = fs.is_dir(&path);
            let candidate = match kind {
                MatchKind::Files => !is_dir && fs.is_file(&path),
                MatchKind::Any => true,
            };
            if candidate && matcher.is_match(display_path(&rel)) {
                found.push(rel);
            }
            if is_dir && max_depth.is_none_or(|max| depth + 1 < max) {
                stack.push((path, depth + 1));
            }
        }
    }

    Ok(found)
}
