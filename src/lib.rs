// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{base_dir, load_and_validate};
use crate::config::WatchSection;
use crate::dag::{ExecutionPlan, TaskGraph, WatchStep};
use crate::engine::{CoreRuntime, RuleTable, Runner, RunnerDispatcher, Runtime, RuntimeEvent};
use crate::errors::BuildError;
use crate::exec::files::display_path;
use crate::exec::{ToolContext, ToolRegistry};
use crate::fs::RealFileSystem;
use crate::watch::livereload;
use crate::watch::{collect_matching_files, compile_rules, spawn_watcher, EventProcessor, FileCache};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and plan resolution
/// - the sequential runner for the requested tasks
/// - (when the plan ends in `watch`) watcher, runtime, LiveReload and
///   Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = base_dir(&config_path);
    let graph = Arc::new(TaskGraph::from_config(cfg));

    if args.list {
        print_list(&graph);
        return Ok(());
    }

    let plan = match graph.plan(&args.tasks) {
        Ok(plan) => plan,
        Err(err @ BuildError::TaskNotFound(_)) => {
            eprintln!("Available: {}", graph.runnable_names().join(", "));
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };
    if args.dry_run {
        print_dry_run(&plan);
        return Ok(());
    }

    let registry = Arc::new(ToolRegistry::from_config(graph.config()));
    let runner = Runner::new(registry, ToolContext::real(&root));

    let report = runner.run(&plan.invocations).await;
    if let Some(err) = report.error {
        return Err(err.into());
    }

    match plan.watch {
        Some(step) => watch(graph, runner, &root, &step).await,
        None => {
            println!("\nDone, without errors.");
            Ok(())
        }
    }
}

/// Run the watch loop until Ctrl-C.
async fn watch(graph: Arc<TaskGraph>, runner: Runner, root: &Path, step: &WatchStep) -> Result<()> {
    let cfg = graph.config();
    let only = step.rule.as_deref();
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let rules = compile_rules(&cfg.watch, only)?;
    let matched = collect_matching_files(&RealFileSystem, &root, &rules)?;
    for (rule, files) in rules.iter().zip(matched.iter()) {
        if files.is_empty() {
            info!(rule = %rule.name(), "watch rule matches no files yet");
        }
    }

    let cache = if cfg.watch.options.skip_unchanged {
        let mut cache = FileCache::new(Arc::new(RealFileSystem));
        for path in matched.iter().flatten() {
            if let Err(err) = cache.prime(path) {
                warn!(path = %display_path(path), error = %err, "failed to hash file");
            }
        }
        debug!(files = cache.len(), "primed content hashes");
        Some(cache)
    } else {
        None
    };

    let reload = match livereload_port(&cfg.watch, only) {
        Some(port) => {
            let (tx, _) = broadcast::channel(16);
            livereload::spawn_server(SocketAddr::from(([0, 0, 0, 0], port)), tx.clone()).await?;
            Some(tx)
        }
        None => None,
    };

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let _watcher = spawn_watcher(EventProcessor::new(&root, rules, cache), rt_tx.clone())?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let core = CoreRuntime::new(
        RuleTable::from_watch(&cfg.watch),
        cfg.config.triggered_while_running_behaviour,
        cfg.config.queue_length,
    );
    let dispatcher = RunnerDispatcher::new(Arc::clone(&graph), runner, rt_tx);

    println!("\nRunning \"watch\" task\nWaiting...");
    Runtime::new(core, rt_rx, dispatcher, reload).run().await?;
    Ok(())
}

/// Port of the first active rule with LiveReload enabled.
fn livereload_port(watch: &WatchSection, only: Option<&str>) -> Option<u16> {
    watch
        .rules
        .iter()
        .filter(|r| only.is_none_or(|name| r.name == name))
        .find_map(|r| r.livereload.unwrap_or(watch.options.livereload).port())
}

fn print_list(graph: &TaskGraph) {
    print!("{}", render_list(graph));
}

/// `--list` output: tasks with their targets, aliases, and `watch:<rule>`
/// entries when watch rules exist.
fn render_list(graph: &TaskGraph) -> String {
    let cfg = graph.config();
    let mut lines = vec!["tasks:".to_string()];

    for task in cfg.tasks.iter() {
        let targets: Vec<&str> = task.targets.iter().map(|t| t.name.as_str()).collect();
        lines.push(format!("  {:<16} {}", task.name, targets.join(", ")));
    }

    if !cfg.aliases.is_empty() {
        lines.push(String::new());
        lines.push("aliases:".to_string());
        for (name, members) in cfg.aliases.iter() {
            lines.push(format!("  {:<16} {}", name, members.join(" ")));
        }
    }

    if !cfg.watch.is_empty() {
        lines.push(String::new());
        lines.push("watch rules:".to_string());
        for rule in cfg.watch.rules.iter() {
            let tasks = if rule.tasks.is_empty() {
                "(reload only)".to_string()
            } else {
                rule.tasks.join(" ")
            };
            let name = format!("watch:{}", rule.name);
            lines.push(format!("  {:<16} {} -> {}", name, rule.files.join(" "), tasks));
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

fn print_dry_run(plan: &ExecutionPlan) {
    print!("{}", render_dry_run(plan));
    debug!("dry-run complete (no execution)");
}

fn render_dry_run(plan: &ExecutionPlan) -> String {
    let mut lines = vec![format!("buildwatch dry-run: {}", plan.requested.join(" "))];
    for inv in plan.invocations.iter() {
        lines.push(format!("  - {}", inv.label()));
        if !inv.options.is_empty() {
            lines.push(format!("      options: {}", toml::Value::Table(inv.options.clone())));
        }
        for group in inv.files.iter() {
            lines.push(format!(
                "      files: {:?} -> {}",
                group.src,
                group.dest.as_deref().unwrap_or("-")
            ));
        }
    }
    if let Some(watch) = &plan.watch {
        match &watch.rule {
            Some(rule) => lines.push(format!("  - watch:{rule}")),
            None => lines.push("  - watch".to_string()),
        }
    }
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::parse_and_validate;

    const TASKS: &str = r#"
        [task.concat.dist]
        options = { separator = ";" }
        src = ["build/js/*.js"]
        dest = "dist/js/script.js"

        [task.notify.js]
        options = { message = "JS bundler finished running" }
    "#;

    const WATCH: &str = r#"
        [alias]
        js = ["concat", "notify:js"]
        dev = ["js", "watch:js"]

        [watch.js]
        files = ["build/js/*.js"]
        tasks = ["js"]

        [watch.html]
        files = ["*.html"]
    "#;

    const NO_WATCH: &str = r#"
        [alias]
        js = ["concat", "notify:js"]
    "#;

    fn graph(extra: &str) -> TaskGraph {
        let text = format!("{TASKS}{extra}");
        TaskGraph::from_config(parse_and_validate(&text, Path::new(".")).unwrap())
    }

    fn row(name: &str, rest: &str) -> String {
        format!("  {name:<16} {rest}")
    }

    #[test]
    fn list_shows_tasks_aliases_and_watch_rules() {
        let out = render_list(&graph(WATCH));
        let lines: Vec<&str> = out.lines().collect();

        for expected in [
            row("concat", "dist"),
            row("notify", "js"),
            row("js", "concat notify:js"),
            row("watch:js", "build/js/*.js -> js"),
            row("watch:html", "*.html -> (reload only)"),
        ] {
            assert!(lines.contains(&expected.as_str()), "missing {expected:?} in\n{out}");
        }
    }

    #[test]
    fn list_omits_watch_section_without_rules() {
        let out = render_list(&graph(NO_WATCH));
        assert!(out.contains("aliases:"), "{out}");
        assert!(!out.contains("watch"), "{out}");
    }

    #[test]
    fn dry_run_lists_invocations_in_order_and_the_watch_step() {
        let plan = graph(WATCH).plan(&["dev".to_string()]).unwrap();
        let out = render_dry_run(&plan);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "buildwatch dry-run: dev");
        assert_eq!(lines[1], "  - concat:dist");
        assert!(lines[2].starts_with("      options: "), "{out}");
        assert!(lines[2].contains("separator"), "{out}");
        assert_eq!(lines[3], r#"      files: ["build/js/*.js"] -> dist/js/script.js"#);
        assert_eq!(lines[4], "  - notify:js");
        assert!(lines[5].contains("JS bundler finished running"), "{out}");
        assert_eq!(lines.last(), Some(&"  - watch:js"));
    }

    #[test]
    fn dry_run_without_watch_ends_with_last_invocation() {
        let plan = graph(NO_WATCH).plan(&["notify".to_string()]).unwrap();
        let out = render_dry_run(&plan);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3, "{out}");
        assert_eq!(lines[0], "buildwatch dry-run: notify");
        assert_eq!(lines[1], "  - notify:js");
        assert!(!out.contains("watch"), "{out}");
    }
}
