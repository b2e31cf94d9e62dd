// src/exec/command.rs

//! Tools backed by an external program (`[tool.<id>]`).
//!
//! Argument vectors are built from the tool's `args` template and `flags`
//! table; the process runs with the project root as working directory.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use toml::Value;
use tracing::{debug, info, warn};

use crate::config::ToolConfig;
use crate::dag::TaskInvocation;
use crate::errors::{BuildError, Result};
use crate::exec::backend::{Tool, ToolContext, ToolFuture};
use crate::exec::files::{all_sources, display_path, FileMapping, MatchKind};

/// Number of stderr lines kept for the failure message.
const STDERR_TAIL: usize = 20;

pub const ENV_TASK: &str = "BUILDWATCH_TASK";
pub const ENV_OPTIONS: &str = "BUILDWATCH_OPTIONS";

#[derive(Debug, Clone)]
pub struct ExternalTool {
    name: String,
    config: ToolConfig,
}

impl ExternalTool {
    pub fn new(name: impl Into<String>, config: ToolConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    fn uses_sources(&self) -> bool {
        self.config.args.iter().any(|a| a == "{src}")
    }

    /// Argument vectors for one invocation, one per process to spawn.
    pub fn argv_sets(&self, inv: &TaskInvocation, mappings: &[FileMapping]) -> Vec<Vec<String>> {
        let flags = flag_args(&self.config, inv);

        if self.config.per_file {
            return mappings
                .iter()
                .filter(|m| {
                    let keep = !(self.uses_sources() && m.src.is_empty());
                    if !keep {
                        warn!(
                            task = %inv.task,
                            target = %inv.target,
                            dest = ?m.dest.as_deref().map(display_path),
                            "no source files for mapping; skipping"
                        );
                    }
                    keep
                })
                .map(|m| {
                    let dest: Vec<PathBuf> = m.dest.iter().cloned().collect();
                    self.build_args(&flags, inv, &m.src, &dest)
                })
                .collect();
        }

        let src = all_sources(mappings);
        if self.uses_sources() && src.is_empty() {
            warn!(task = %inv.task, target = %inv.target, "no source files; skipping");
            return Vec::new();
        }
        let mut dest: Vec<PathBuf> = Vec::new();
        for d in mappings.iter().filter_map(|m| m.dest.clone()) {
            if !dest.contains(&d) {
                dest.push(d);
            }
        }
        vec![self.build_args(&flags, inv, &src, &dest)]
    }

    fn build_args(
        &self,
        flags: &[String],
        inv: &TaskInvocation,
        src: &[PathBuf],
        dest: &[PathBuf],
    ) -> Vec<String> {
        let mut args = flags.to_vec();
        for arg in self.config.args.iter() {
            match arg.as_str() {
                "{src}" => args.extend(src.iter().map(|p| display_path(p))),
                "{dest}" => args.extend(dest.iter().map(|p| display_path(p))),
                _ => {
                    let first_src = src.first().map(|p| display_path(p)).unwrap_or_default();
                    let first_dest = dest.first().map(|p| display_path(p)).unwrap_or_default();
                    args.push(
                        arg.replace("{src}", &first_src)
                            .replace("{dest}", &first_dest)
                            .replace("{task}", &inv.task)
                            .replace("{target}", &inv.target),
                    );
                }
            }
        }
        args
    }

    async fn run_invocation(&self, ctx: &ToolContext, inv: &TaskInvocation) -> Result<()> {
        let mappings = ctx.expand(&inv.files, MatchKind::Files)?;
        let options = serde_json::to_string(&inv.options)?;

        for argv in self.argv_sets(inv, &mappings) {
            spawn_and_wait(
                &inv.label(),
                &self.name,
                &self.config.cmd,
                &argv,
                ctx,
                &[(ENV_TASK, inv.label()), (ENV_OPTIONS, options.clone())],
            )
            .await?;
        }
        Ok(())
    }
}

impl Tool for ExternalTool {
    fn run<'a>(&'a self, ctx: &'a ToolContext, inv: &'a TaskInvocation) -> ToolFuture<'a> {
        Box::pin(self.run_invocation(ctx, inv))
    }
}

/// Translate options that have a `flags` mapping into command-line flags.
///
/// - `true` emits the flag alone, `false` emits nothing;
/// - scalars emit `flag value`, or `flagvalue` when the flag ends in `=`;
/// - arrays repeat the flag per element.
fn flag_args(tool: &ToolConfig, inv: &TaskInvocation) -> Vec<String> {
    let mut out = Vec::new();
    for (key, value) in inv.options.iter() {
        let Some(flag) = tool.flags.get(key) else {
            continue;
        };
        match value {
            Value::Boolean(true) => out.push(flag.clone()),
            Value::Boolean(false) => {}
            Value::Array(items) => {
                for item in items {
                    push_flag(&mut out, flag, item);
                }
            }
            other => push_flag(&mut out, flag, other),
        }
    }
    out
}

fn push_flag(out: &mut Vec<String>, flag: &str, value: &Value) {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if flag.ends_with('=') {
        out.push(format!("{flag}{rendered}"));
    } else {
        out.push(flag.to_string());
        out.push(rendered);
    }
}

async fn spawn_and_wait(
    label: &str,
    tool: &str,
    program: &str,
    argv: &[String],
    ctx: &ToolContext,
    env: &[(&str, String)],
) -> Result<()> {
    info!(task = %label, tool, cmd = %program, args = ?argv, "starting tool process");

    let mut cmd = Command::new(program);
    cmd.args(argv)
        .current_dir(&ctx.root)
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in env {
        cmd.env(key, value);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| {
            BuildError::tool_failed(label, format!("cannot start `{program}` for [tool.{tool}]: {e}"))
        })?;

    // Forward stderr and keep its tail for the failure message.
    let tail = child.stderr.take().map(|stderr| {
        let task = label.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL);
            while let Ok(Some(line)) = lines.next_line().await {
                eprintln!("{line}");
                debug!(task = %task, "stderr: {}", line);
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        })
    });

    let status = child
        .wait()
        .await
        .map_err(|e| BuildError::tool_failed(label, format!("waiting for `{program}`: {e}")))?;

    let tail = match tail {
        Some(handle) => handle.await.unwrap_or_default(),
        None => VecDeque::new(),
    };

    let code = status.code().unwrap_or(-1);
    info!(task = %label, exit_code = code, success = status.success(), "tool process exited");

    if status.success() {
        return Ok(());
    }

    let mut reason = format!("`{program}` exited with code {code}");
    if !tail.is_empty() {
        reason.push_str(":\n");
        reason.push_str(&Vec::from(tail).join("\n"));
    }
    Err(BuildError::tool_failed(label, reason))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use toml::Table;

    use super::*;
    use crate::config::FileGroup;

    fn lessc() -> ExternalTool {
        let mut flags = BTreeMap::new();
        flags.insert("compress".to_string(), "--compress".to_string());
        flags.insert("strictMath".to_string(), "--strict-math=".to_string());
        flags.insert("include".to_string(), "--include-path".to_string());
        ExternalTool::new(
            "less",
            ToolConfig {
                cmd: "lessc".into(),
                args: vec!["{src}".into(), "{dest}".into()],
                per_file: true,
                flags,
            },
        )
    }

    fn invocation(options: &str) -> TaskInvocation {
        TaskInvocation {
            task: "less".into(),
            target: "production".into(),
            options: toml::from_str::<Table>(options).unwrap(),
            files: vec![FileGroup::sources(["a.less"]).with_dest("a.css")],
            data: Table::new(),
        }
    }

    fn mapping(src: &[&str], dest: Option<&str>) -> FileMapping {
        FileMapping {
            src: src.iter().map(PathBuf::from).collect(),
            dest: dest.map(PathBuf::from),
        }
    }

    #[test]
    fn flags_precede_file_arguments() {
        let inv = invocation(
            r#"
            compress = true
            strictMath = "on"
            include = ["a", "b"]
            unmapped = 3
            "#,
        );
        let sets = lessc().argv_sets(&inv, &[mapping(&["a.less"], Some("a.css"))]);
        assert_eq!(
            sets,
            vec![vec![
                "--compress",
                "--strict-math=on",
                "--include-path",
                "a",
                "--include-path",
                "b",
                "a.less",
                "a.css",
            ]]
        );
    }

    #[test]
    fn per_file_spawns_one_process_per_mapping_and_skips_empty() {
        let inv = invocation("compress = false");
        let sets = lessc().argv_sets(
            &inv,
            &[
                mapping(&["a.less"], Some("a.css")),
                mapping(&[], Some("b.css")),
                mapping(&["c.less"], Some("c.css")),
            ],
        );
        assert_eq!(sets, vec![vec!["a.less", "a.css"], vec!["c.less", "c.css"]]);
    }

    #[test]
    fn batched_tool_gets_all_sources_once() {
        let tool = ExternalTool::new(
            "jshint",
            ToolConfig {
                cmd: "jshint".into(),
                args: vec!["--reporter={target}".into(), "{src}".into()],
                per_file: false,
                flags: BTreeMap::new(),
            },
        );
        let inv = invocation("");
        let sets = tool.argv_sets(
            &inv,
            &[mapping(&["a.js", "b.js"], None), mapping(&["c.js"], None)],
        );
        assert_eq!(sets, vec![vec!["--reporter=production", "a.js", "b.js", "c.js"]]);

        assert!(tool.argv_sets(&inv, &[]).is_empty());
    }

    #[test]
    fn tool_without_src_placeholder_runs_even_without_files() {
        let tool = ExternalTool::new(
            "shell",
            ToolConfig {
                cmd: "make".into(),
                args: vec!["{target}".into()],
                per_file: false,
                flags: BTreeMap::new(),
            },
        );
        assert_eq!(tool.argv_sets(&invocation(""), &[]), vec![vec!["production"]]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_tool_failure_with_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExternalTool::new(
            "fail",
            ToolConfig {
                cmd: "sh".into(),
                args: vec!["-c".into(), "echo broken >&2; exit 3".into()],
                per_file: false,
                flags: BTreeMap::new(),
            },
        );
        let ctx = ToolContext::real(dir.path());
        let mut inv = invocation("");
        inv.files.clear();
        let err = tool.run(&ctx, &inv).await.unwrap_err();
        match err {
            BuildError::ToolFailed { task, reason } => {
                assert_eq!(task, "less:production");
                assert!(reason.contains("code 3"), "{reason}");
                assert!(reason.contains("broken"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_names_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExternalTool::new(
            "uglify",
            ToolConfig {
                cmd: "buildwatch-no-such-program".into(),
                args: vec!["{target}".into()],
                per_file: false,
                flags: BTreeMap::new(),
            },
        );
        let ctx = ToolContext::real(dir.path());
        let mut inv = invocation("");
        inv.files.clear();
        match tool.run(&ctx, &inv).await {
            Err(BuildError::ToolFailed { task, reason }) => {
                assert_eq!(task, "less:production");
                assert!(reason.contains("[tool.uglify]"), "{reason}");
                assert!(reason.contains("buildwatch-no-such-program"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn task_label_is_exported_to_the_environment() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExternalTool::new(
            "env",
            ToolConfig {
                cmd: "sh".into(),
                args: vec!["-c".into(), "printf %s \"$BUILDWATCH_TASK\" > out.txt".into()],
                per_file: false,
                flags: BTreeMap::new(),
            },
        );
        let ctx = ToolContext::real(dir.path());
        let mut inv = invocation("");
        inv.files.clear();
        tool.run(&ctx, &inv).await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "less:production");
    }
}
