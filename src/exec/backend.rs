// src/exec/backend.rs

//! Pluggable tool abstraction.
//!
//! The runner talks to a [`ToolRegistry`] instead of spawning processes
//! directly. Each task identifier maps to a [`Tool`]:
//!
//! - [`ExternalTool`](super::command::ExternalTool) runs a configured program.
//! - Built-ins (`concat`, `replace`, `clean`, `notify`) operate on files
//!   through the [`FileSystem`] seam.
//! - Tests register recording or failing fakes.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::config::ConfigFile;
use crate::config::FileGroup;
use crate::dag::TaskInvocation;
use crate::errors::Result;
use crate::exec::builtin;
use crate::exec::command::ExternalTool;
use crate::exec::files::{expand_files, FileMapping, MatchKind};
use crate::fs::{FileSystem, RealFileSystem};

/// Boxed future returned by [`Tool::run`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Something that can carry out one [`TaskInvocation`].
///
/// Implementations must return an error (never panic) when the work fails;
/// the runner aborts the surrounding composite on the first error.
pub trait Tool: Send + Sync {
    fn run<'a>(&'a self, ctx: &'a ToolContext, inv: &'a TaskInvocation) -> ToolFuture<'a>;
}

/// Environment shared by all tool invocations of a process.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Project root; every file pattern and destination is relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
}

impl ToolContext {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    /// Context backed by the real filesystem.
    pub fn real(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(RealFileSystem))
    }

    /// Absolute (root-joined) path for a root-relative one.
    pub fn abs(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }

    pub fn expand(&self, files: &[FileGroup], kind: MatchKind) -> Result<Vec<FileMapping>> {
        expand_files(self.fs.as_ref(), &self.root, files, kind)
    }
}

/// Maps task identifiers to tool implementations.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    /// Empty registry (tests register exactly what they need).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Built-ins plus one [`ExternalTool`] per `[tool.<id>]`; a declared tool
    /// replaces a built-in of the same name.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut registry = Self::with_builtins();
        for (name, tool) in cfg.tools.iter() {
            registry.register(name, ExternalTool::new(name, tool.clone()));
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, tool: impl Tool + 'static) {
        self.tools.insert(name.into(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}
