// src/exec/builtin/replace.rs

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use toml::Value;
use tracing::info;

use crate::dag::TaskInvocation;
use crate::errors::{BuildError, Result};
use crate::exec::backend::{Tool, ToolContext, ToolFuture};
use crate::exec::files::{display_path, MatchKind};

/// Text replacement over source files.
///
/// Target keys:
/// - `replacements = [{ from, to, regex = false }]`
/// - `overwrite = true` rewrites sources in place; otherwise `dest` is a file
///   (single source) or a directory when it ends in `/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Replace;

impl Tool for Replace {
    fn run<'a>(&'a self, ctx: &'a ToolContext, inv: &'a TaskInvocation) -> ToolFuture<'a> {
        Box::pin(async move { replace(ctx, inv) })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Replacement {
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    regex: bool,
}

#[derive(Debug)]
enum Rule {
    Literal { from: String, to: String },
    Pattern { re: Regex, to: String },
}

impl Rule {
    fn apply<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        match self {
            Rule::Literal { from, to } => {
                let hits = text.matches(from.as_str()).count();
                if hits == 0 {
                    (Cow::Borrowed(text), 0)
                } else {
                    (Cow::Owned(text.replace(from.as_str(), to)), hits)
                }
            }
            Rule::Pattern { re, to } => {
                let hits = re.find_iter(text).count();
                (re.replace_all(text, to.as_str()), hits)
            }
        }
    }
}

fn rules(inv: &TaskInvocation) -> Result<Vec<Rule>> {
    let label = inv.label();
    let Some(Value::Array(items)) = inv.data.get("replacements") else {
        return Err(BuildError::config(format!(
            "{label}: replace needs a `replacements` array"
        )));
    };

    items
        .iter()
        .map(|item| {
            let r: Replacement = item
                .clone()
                .try_into()
                .map_err(|e| BuildError::config(format!("{label}: bad replacement: {e}")))?;
            if r.from.is_empty() {
                return Err(BuildError::config(format!("{label}: empty `from` in replacement")));
            }
            if r.regex {
                let re = Regex::new(&r.from).map_err(|e| {
                    BuildError::config(format!("{label}: invalid regex '{}': {e}", r.from))
                })?;
                Ok(Rule::Pattern { re, to: r.to })
            } else {
                Ok(Rule::Literal { from: r.from, to: r.to })
            }
        })
        .collect()
}

fn replace(ctx: &ToolContext, inv: &TaskInvocation) -> Result<()> {
    let label = inv.label();
    let rules = rules(inv)?;
    let overwrite = inv.data.get("overwrite").and_then(Value::as_bool).unwrap_or(false);

    let mut total = 0usize;
    for mapping in ctx.expand(&inv.files, MatchKind::Files)? {
        let targets: Vec<(PathBuf, PathBuf)> = match (&mapping.dest, overwrite) {
            (Some(_), true) => {
                return Err(BuildError::config(format!(
                    "{label}: `overwrite` and `dest` are mutually exclusive"
                )));
            }
            (None, true) => mapping.src.iter().map(|s| (s.clone(), s.clone())).collect(),
            (None, false) => {
                return Err(BuildError::config(format!(
                    "{label}: replace needs a `dest` or `overwrite = true`"
                )));
            }
            (Some(dest), false) if is_dir_dest(ctx, dest) => mapping
                .src
                .iter()
                .map(|s| (s.clone(), dest.join(s.file_name().unwrap_or(s.as_os_str()))))
                .collect(),
            (Some(dest), false) => {
                if mapping.src.len() > 1 {
                    return Err(BuildError::config(format!(
                        "{label}: cannot write {} sources into the single file '{}'",
                        mapping.src.len(),
                        display_path(dest)
                    )));
                }
                mapping.src.iter().map(|s| (s.clone(), dest.clone())).collect()
            }
        };

        for (src, dest) in targets {
            let mut text = ctx.fs.read_to_string(&ctx.abs(&src))?;
            for rule in rules.iter() {
                let (next, hits) = rule.apply(&text);
                total += hits;
                text = next.into_owned();
            }
            ctx.fs.write(&ctx.abs(&dest), text.as_bytes())?;
        }
    }

    info!(task = %label, replacements = total, "replaced");
    println!(">> {total} replacements.");
    Ok(())
}

fn is_dir_dest(ctx: &ToolContext, dest: &Path) -> bool {
    display_path(dest).ends_with('/') || ctx.fs.is_dir(&ctx.abs(dest))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use toml::Table;

    use super::*;
    use crate::config::FileGroup;
    use crate::fs::mock::MockFileSystem;

    fn inv(data: &str, files: Vec<FileGroup>) -> TaskInvocation {
        TaskInvocation {
            task: "replace".into(),
            target: "version".into(),
            options: Table::new(),
            files,
            data: toml::from_str::<Table>(data).unwrap(),
        }
    }

    #[tokio::test]
    async fn literal_and_regex_rules_apply_in_order() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("./index.html", "<script src=\"app.js?v=1\"></script> app.js");
        let ctx = ToolContext::new(".", fs.clone());
        let inv = inv(
            r#"
            overwrite = true
            replacements = [
                { from = 'v=\d+', to = "v=42", regex = true },
                { from = "app.js", to = "app.min.js" },
            ]
            "#,
            vec![FileGroup::sources(["index.html"])],
        );

        Replace.run(&ctx, &inv).await.unwrap();
        assert_eq!(
            fs.contents("./index.html").as_deref(),
            Some("<script src=\"app.min.js?v=42\"></script> app.min.js")
        );
    }

    #[tokio::test]
    async fn directory_dest_keeps_file_names() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("./src/a.txt", "x");
        fs.add_file("./src/b.txt", "xx");
        let ctx = ToolContext::new(".", fs.clone());
        let inv = inv(
            r#"replacements = [{ from = "x", to = "y" }]"#,
            vec![FileGroup::sources(["src/*.txt"]).with_dest("out/")],
        );

        Replace.run(&ctx, &inv).await.unwrap();
        assert_eq!(fs.contents("./out/a.txt").as_deref(), Some("y"));
        assert_eq!(fs.contents("./out/b.txt").as_deref(), Some("yy"));
        assert_eq!(fs.contents("./src/a.txt").as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn several_sources_into_one_file_is_rejected() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("./src/a.txt", "x");
        fs.add_file("./src/b.txt", "x");
        let ctx = ToolContext::new(".", fs);
        let inv = inv(
            r#"replacements = [{ from = "x", to = "y" }]"#,
            vec![FileGroup::sources(["src/*.txt"]).with_dest("out.txt")],
        );
        assert!(matches!(
            Replace.run(&ctx, &inv).await,
            Err(BuildError::ConfigError(msg)) if msg.contains("2 sources")
        ));
    }

    #[tokio::test]
    async fn missing_replacements_is_a_config_error() {
        let fs = Arc::new(MockFileSystem::new());
        let ctx = ToolContext::new(".", fs);
        let inv = inv("overwrite = true", vec![]);
        assert!(matches!(
            Replace.run(&ctx, &inv).await,
            Err(BuildError::ConfigError(_))
        ));
    }
}
