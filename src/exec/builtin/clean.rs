// src/exec/builtin/clean.rs

use std::path::{Component, Path};

use tracing::{debug, info};

use crate::dag::TaskInvocation;
use crate::errors::{BuildError, Result};
use crate::exec::backend::{Tool, ToolContext, ToolFuture};
use crate::exec::files::{all_sources, display_path, MatchKind};

/// Delete matched files and directories.
///
/// Refuses the project root and anything outside it unless `force = true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clean;

impl Tool for Clean {
    fn run<'a>(&'a self, ctx: &'a ToolContext, inv: &'a TaskInvocation) -> ToolFuture<'a> {
        Box::pin(async move { clean(ctx, inv) })
    }
}

fn clean(ctx: &ToolContext, inv: &TaskInvocation) -> Result<()> {
    let force = inv.option_bool("force");
    let paths = all_sources(&ctx.expand(&inv.files, MatchKind::Any)?);

    let mut removed = 0usize;
    for rel in paths.iter() {
        if !force && !inside_root(rel) {
            return Err(BuildError::tool_failed(
                inv.label(),
                format!(
                    "refusing to delete '{}' (project root or outside it); set `force = true` to override",
                    display_path(rel)
                ),
            ));
        }
        let abs = ctx.abs(rel);
        // An earlier match may have been a parent directory.
        if !ctx.fs.exists(&abs) {
            debug!(path = %display_path(rel), "already removed");
            continue;
        }
        ctx.fs.remove(&abs)?;
        removed += 1;
    }

    info!(task = %inv.label(), removed, "cleaned");
    println!(">> {removed} paths cleaned.");
    Ok(())
}

/// Relative, non-empty, and never climbing above the root.
fn inside_root(rel: &Path) -> bool {
    let mut depth = 0i32;
    for component in rel.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth > 0
}
