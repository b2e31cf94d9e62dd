// src/exec/builtin/concat.rs

use tracing::{info, warn};

use crate::dag::TaskInvocation;
use crate::errors::{BuildError, Result};
use crate::exec::backend::{Tool, ToolContext, ToolFuture};
use crate::exec::files::{display_path, MatchKind};

/// Concatenate sources into `dest`, wrapped in `banner` and `footer`.
///
/// Options: `separator` (default `"\n"`), `banner`, `footer`. A mapping whose
/// sources all vanished still writes `banner + footer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Concat;

impl Tool for Concat {
    fn run<'a>(&'a self, ctx: &'a ToolContext, inv: &'a TaskInvocation) -> ToolFuture<'a> {
        Box::pin(async move { concat(ctx, inv) })
    }
}

fn concat(ctx: &ToolContext, inv: &TaskInvocation) -> Result<()> {
    let separator = inv.option_str("separator").unwrap_or("\n");
    let banner = inv.option_str("banner").unwrap_or_default();
    let footer = inv.option_str("footer").unwrap_or_default();

    let mappings = ctx.expand(&inv.files, MatchKind::Files)?;
    if mappings.is_empty() {
        warn!(task = %inv.task, target = %inv.target, "no files to concatenate");
    }

    for mapping in mappings {
        let dest = mapping.dest.as_ref().ok_or_else(|| {
            BuildError::config(format!("{}: concat needs a `dest`", inv.label()))
        })?;

        let mut parts = Vec::with_capacity(mapping.src.len());
        for src in mapping.src.iter() {
            parts.push(ctx.fs.read_to_string(&ctx.abs(src))?);
        }

        let output = format!("{banner}{}{footer}", parts.join(separator));
        ctx.fs.write(&ctx.abs(dest), output.as_bytes())?;

        info!(task = %inv.label(), dest = %display_path(dest), sources = parts.len(), "concatenated");
        println!(">> File \"{}\" created.", display_path(dest));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use toml::Table;

    use super::*;
    use crate::config::FileGroup;
    use crate::fs::mock::MockFileSystem;

    fn inv(options: &str, files: Vec<FileGroup>) -> TaskInvocation {
        TaskInvocation {
            task: "concat".into(),
            target: "dist".into(),
            options: toml::from_str::<Table>(options).unwrap(),
            files,
            data: Table::new(),
        }
    }

    #[tokio::test]
    async fn joins_sources_with_banner_and_separator() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("./js/a.js", "var a;");
        fs.add_file("./js/b.js", "var b;");
        let ctx = ToolContext::new(".", fs.clone());

        let inv = inv(
            r#"banner = "/* hi */\n"
               separator = ";\n""#,
            vec![FileGroup::sources(["js/*.js"]).with_dest("dist/all.js")],
        );
        Concat.run(&ctx, &inv).await.unwrap();

        assert_eq!(
            fs.contents("./dist/all.js").as_deref(),
            Some("/* hi */\nvar a;;\nvar b;")
        );
    }

    #[tokio::test]
    async fn empty_input_set_writes_banner_only() {
        let fs = Arc::new(MockFileSystem::new());
        let ctx = ToolContext::new(".", fs.clone());
        let inv = inv(
            r#"banner = "/*! app */""#,
            vec![FileGroup::sources(["js/missing.js"]).with_dest("dist/script.js")],
        );
        Concat.run(&ctx, &inv).await.unwrap();
        assert_eq!(fs.contents(Path::new("./dist/script.js")).as_deref(), Some("/*! app */"));
    }

    #[tokio::test]
    async fn missing_dest_is_an_error() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("./js/a.js", "a");
        let ctx = ToolContext::new(".", fs);
        let inv = inv("", vec![FileGroup::sources(["js/a.js"])]);
        assert!(matches!(
            Concat.run(&ctx, &inv).await,
            Err(BuildError::ConfigError(_))
        ));
    }
}
