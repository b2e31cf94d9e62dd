// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobSet, GlobSetBuilder};

use crate::config::WatchSection;
use crate::exec::files::compile_glob;
use crate::fs::FileSystem;

/// Compiled glob patterns of one `[watch.<rule>]`.
///
/// Patterns are relative to the project root; the watcher passes relative,
/// `/`-separated paths (e.g. `"build/less/site.less"`) into `matches`.
/// A leading `!` excludes.
#[derive(Clone)]
pub struct WatchRule {
    name: String,
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl WatchRule {
    pub fn new<S: AsRef<str>>(name: impl Into<String>, patterns: &[S]) -> Result<Self> {
        let name = name.into();
        let (excludes, includes): (Vec<&str>, Vec<&str>) = patterns
            .iter()
            .map(AsRef::as_ref)
            .partition(|p| p.starts_with('!'));

        let include_set = build_globset(includes.iter().copied())
            .with_context(|| format!("building watch globset for rule {name}"))?;
        let exclude_set = if excludes.is_empty() {
            None
        } else {
            Some(
                build_globset(excludes.iter().map(|p| &p[1..]))
                    .with_context(|| format!("building exclude globset for rule {name}"))?,
            )
        };

        Ok(Self {
            name,
            include_set,
            exclude_set,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Compile the rules of a `[watch]` section, optionally only one of them
/// (`watch:<rule>`).
pub fn compile_rules(watch: &WatchSection, only: Option<&str>) -> Result<Vec<WatchRule>> {
    watch
        .rules
        .iter()
        .filter(|r| only.is_none_or(|name| r.name == name))
        .map(|r| WatchRule::new(r.name.clone(), &r.files))
        .collect()
}

fn build_globset<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

/// Directories never descended into when scanning the project up front.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// Files under `root` matched by each rule, in rule order, from a single walk.
///
/// `.git`, `node_modules` and `target` are not scanned.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    rules: &[WatchRule],
) -> Result<Vec<Vec<PathBuf>>> {
    let mut matched = vec![Vec::new(); rules.len()];
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                let skipped = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| SKIPPED_DIRS.contains(&n));
                if !skipped {
                    stack.push(path);
                }
                continue;
            }
            if !fs.is_file(&path) {
                continue;
            }
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            for (rule, files) in rules.iter().zip(matched.iter_mut()) {
                if rule.matches(&rel_str) {
                    files.push(path.clone());
                }
            }
        }
    }

    for files in matched.iter_mut() {
        files.sort();
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn star_stays_in_its_directory_and_bang_excludes() {
        let rule = WatchRule::new("js", &["build/js/*.js", "!build/js/*.min.js"]).unwrap();
        assert!(rule.matches("build/js/app.js"));
        assert!(!rule.matches("build/js/vendor/lib.js"));
        assert!(!rule.matches("build/js/app.min.js"));
    }

    #[test]
    fn collects_matches_per_rule_and_skips_dependency_dirs() {
        let fs = MockFileSystem::new();
        fs.add_file("./index.html", "<html>");
        fs.add_file("./build/less/site.less", "a {}");
        fs.add_file("./build/less/parts/nav.less", "b {}");

        fs.add_file("./node_modules/pkg/theme.less", "c {}");

        let rules = vec![
            WatchRule::new("less", &["**/*.less"]).unwrap(),
            WatchRule::new("html", &["*.html"]).unwrap(),
            WatchRule::new("pug", &["build/**/*.pug"]).unwrap(),
        ];
        let files = collect_matching_files(&fs, Path::new("."), &rules).unwrap();
        assert_eq!(
            files,
            vec![
                vec![
                    PathBuf::from("./build/less/parts/nav.less"),
                    PathBuf::from("./build/less/site.less"),
                ],
                vec![PathBuf::from("./index.html")],
                Vec::new(),
            ]
        );
    }
}
