// src/watch/event_handler.rs

//! Turns changed filesystem paths into a [`TriggerBatch`].

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::engine::TriggerBatch;
use crate::watch::cache::FileCache;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchRule;

/// Stateful mapper from absolute event paths to matched rules.
#[derive(Debug)]
pub struct EventProcessor {
    root: PathBuf,
    rules: Vec<WatchRule>,
    /// Present when `skip_unchanged` is on.
    cache: Option<FileCache>,
}

impl EventProcessor {
    pub fn new(root: impl Into<PathBuf>, rules: Vec<WatchRule>, cache: Option<FileCache>) -> Self {
        Self {
            root: root.into(),
            rules,
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Match every path against every rule.
    ///
    /// A path only triggers rules whose globs match it, so a rule whose
    /// globs match no file never fires. With a cache, paths whose content
    /// hash is unchanged are dropped.
    pub fn process(&mut self, paths: &[PathBuf]) -> TriggerBatch {
        let mut batch = TriggerBatch::new();

        for path in paths {
            let Some(rel) = relative_str(&self.root, path) else {
                warn!("could not relativize path {:?} against root {:?}", path, self.root);
                continue;
            };
            if rel.is_empty() {
                continue;
            }

            let matching: Vec<&str> = self
                .rules
                .iter()
                .filter(|r| r.matches(&rel))
                .map(WatchRule::name)
                .collect();
            if matching.is_empty() {
                continue;
            }

            if let Some(cache) = self.cache.as_mut() {
                match cache.changed(path) {
                    Ok(false) => {
                        info!(path = %rel, "content unchanged; skipping");
                        continue;
                    }
                    Ok(true) => {}
                    Err(err) => {
                        warn!(path = %rel, error = %err, "failed to hash file; triggering anyway");
                    }
                }
            }

            debug!(path = %rel, rules = ?matching, "watch match");
            for rule in matching {
                batch.add(rule, rel.clone());
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn rules() -> Vec<WatchRule> {
        vec![
            WatchRule::new("less", &["build/less/**/*.less"]).unwrap(),
            WatchRule::new("html", &["*.html", "*.php"]).unwrap(),
            WatchRule::new("all", &["**/*.html"]).unwrap(),
        ]
    }

    #[test]
    fn paths_map_to_every_matching_rule() {
        let mut p = EventProcessor::new("/proj", rules(), None);
        let batch = p.process(&[
            PathBuf::from("/proj/index.html"),
            PathBuf::from("/proj/build/less/site.less"),
            PathBuf::from("/proj/README.md"),
        ]);
        assert_eq!(batch.rules(), vec!["html", "all", "less"]);
        assert_eq!(batch.entries()[2].paths, vec!["build/less/site.less"]);
    }

    #[test]
    fn unchanged_content_is_skipped() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("./index.html", "<p>");
        let mut cache = FileCache::new(fs.clone());
        cache.prime(Path::new("./index.html")).unwrap();

        let mut p = EventProcessor::new(".", rules(), Some(cache));
        assert!(p.process(&[PathBuf::from("./index.html")]).is_empty());

        fs.add_file("./index.html", "<p>changed");
        assert_eq!(p.process(&[PathBuf::from("./index.html")]).rules(), vec!["html", "all"]);
    }

    #[test]
    fn paths_outside_root_are_ignored() {
        let mut p = EventProcessor::new("/proj", rules(), None);
        assert!(p.process(&[PathBuf::from("/elsewhere/index.html")]).is_empty());
    }
}
