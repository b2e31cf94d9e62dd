// src/exec/builtin/notify.rs

use tracing::info;

use crate::dag::TaskInvocation;
use crate::errors::{BuildError, Result};
use crate::exec::backend::{Tool, ToolContext, ToolFuture};

/// Console notification: `[title] message`.
///
/// `options.message` is required; `options.title` defaults to the target name.
#[derive(Debug, Clone, Copy, Default)]
pub struct Notify;

impl Tool for Notify {
    fn run<'a>(&'a self, _ctx: &'a ToolContext, inv: &'a TaskInvocation) -> ToolFuture<'a> {
        Box::pin(async move { notify(inv) })
    }
}

fn notify(inv: &TaskInvocation) -> Result<()> {
    let line = render(inv)?;
    info!(task = %inv.label(), notification = %line, "notification");
    println!("{line}");
    Ok(())
}

fn render(inv: &TaskInvocation) -> Result<String> {
    let title = inv.option_str("title").unwrap_or(&inv.target);
    let message = inv
        .option_str("message")
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| BuildError::tool_failed(inv.label(), "notify needs `options.message`"))?;
    Ok(format!("[{title}] {message}"))
}
