// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{
    ConfigFile, RawConfigFile, TaskDefinition, WatchSection, WATCH_TASK,
};
use crate::errors::{BuildError, Result};
use crate::exec::builtin;
use crate::exec::files::compile_glob;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let tasks = raw
            .task
            .iter()
            .map(|(name, value)| {
                let table = value.as_table().ok_or_else(|| {
                    BuildError::config(format!("[task.{name}] must be a table"))
                })?;
                TaskDefinition::from_table(name, table)
            })
            .collect::<Result<Vec<_>>>()?;
        let watch = WatchSection::from_table(&raw.watch)?;

        let cfg = ConfigFile::new_unchecked(raw.config, raw.tool, tasks, raw.alias, watch);
        validate_config(&cfg)?;
        Ok(cfg)
    }
}

/// A resolved reference to something runnable, as written in an alias or a
/// watch rule's `tasks` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRef<'a> {
    /// `watch` or `watch:<rule>`.
    Watch(Option<&'a str>),
    /// Another composite task.
    Alias(&'a str),
    /// Every target of a task, in declaration order.
    Task(&'a str),
    /// `<task>:<target>`.
    Target { task: &'a str, target: &'a str },
}

impl<'a> MemberRef<'a> {
    /// Resolve `member` against the configuration.
    ///
    /// Returns [`BuildError::TaskNotFound`] for anything undefined, including
    /// `watch` when no watch rules are configured.
    pub fn parse(cfg: &ConfigFile, member: &'a str) -> Result<Self> {
        match member.split_once(':') {
            None if member == WATCH_TASK && !cfg.watch.is_empty() => Ok(MemberRef::Watch(None)),
            None if cfg.aliases.contains_key(member) => Ok(MemberRef::Alias(member)),
            None if cfg.task(member).is_some() => Ok(MemberRef::Task(member)),
            None => Err(BuildError::TaskNotFound(member.to_string())),
            Some((WATCH_TASK, rule)) => {
                if cfg.watch.rule(rule).is_some() {
                    Ok(MemberRef::Watch(Some(rule)))
                } else {
                    Err(BuildError::TaskNotFound(member.to_string()))
                }
            }
            Some((task, target)) => match cfg.task(task) {
                Some(def) if def.target(target).is_some() => {
                    Ok(MemberRef::Target { task, target })
                }
                _ => Err(BuildError::TaskNotFound(member.to_string())),
            },
        }
    }
}

/// Run every startup check against an assembled configuration.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_work(cfg)?;
    validate_global_config(cfg)?;
    validate_reserved_names(cfg)?;
    validate_tools(cfg)?;
    validate_aliases(cfg)?;
    validate_alias_cycles(cfg)?;
    validate_watch_rules(cfg)?;
    Ok(())
}

fn ensure_has_work(cfg: &ConfigFile) -> Result<()> {
    if cfg.tasks.is_empty() && cfg.watch.is_empty() {
        return Err(BuildError::config(
            "config must contain at least one [task.<name>] or [watch.<rule>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(BuildError::config(
            "[config].queue_length must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

fn validate_reserved_names(cfg: &ConfigFile) -> Result<()> {
    let clash = cfg.task(WATCH_TASK).is_some()
        || cfg.tools.contains_key(WATCH_TASK)
        || cfg.aliases.contains_key(WATCH_TASK);
    if clash {
        return Err(BuildError::config(format!(
            "'{WATCH_TASK}' is reserved for the file watcher; configure it under [watch]"
        )));
    }

    for name in cfg
        .tasks
        .iter()
        .map(|t| t.name.as_str())
        .chain(cfg.aliases.keys().map(String::as_str))
    {
        if name.contains(':') {
            return Err(BuildError::config(format!(
                "task or alias name '{name}' must not contain ':'"
            )));
        }
    }
    Ok(())
}

fn validate_tools(cfg: &ConfigFile) -> Result<()> {
    for (name, tool) in cfg.tools.iter() {
        if tool.cmd.trim().is_empty() {
            return Err(BuildError::config(format!(
                "[tool.{name}] must set a non-empty `cmd`"
            )));
        }
    }

    for task in cfg.tasks.iter() {
        if !cfg.tools.contains_key(&task.name) && !builtin::is_builtin(&task.name) {
            return Err(BuildError::config(format!(
                "task '{}' has no tool: declare [tool.{}] (built-ins: {})",
                task.name,
                task.name,
                builtin::BUILTIN_TOOLS.join(", ")
            )));
        }
    }
    Ok(())
}

fn validate_aliases(cfg: &ConfigFile) -> Result<()> {
    for (name, members) in cfg.aliases.iter() {
        if cfg.task(name).is_some() {
            return Err(BuildError::config(format!(
                "alias '{name}' has the same name as a task"
            )));
        }
        if members.is_empty() {
            return Err(BuildError::config(format!(
                "alias '{name}' must list at least one task"
            )));
        }
        for member in members {
            if let Err(err) = MemberRef::parse(cfg, member) {
                return Err(BuildError::config(format!(
                    "alias '{name}' references undefined task '{member}' ({err})"
                )));
            }
        }
    }
    Ok(())
}

fn validate_alias_cycles(cfg: &ConfigFile) -> Result<()> {
    // Edge direction: alias -> alias it includes.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.aliases.keys() {
        graph.add_node(name.as_str());
    }

    for (name, members) in cfg.aliases.iter() {
        for member in members {
            if let Ok(MemberRef::Alias(inner)) = MemberRef::parse(cfg, member) {
                graph.add_edge(name.as_str(), inner, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(BuildError::AliasCycle(format!(
            "cycle detected in aliases involving '{}'",
            cycle.node_id()
        ))),
    }
}

fn validate_watch_rules(cfg: &ConfigFile) -> Result<()> {
    for rule in cfg.watch.rules.iter() {
        if rule.files.is_empty() {
            return Err(BuildError::config(format!(
                "watch rule '{}' must list at least one file pattern",
                rule.name
            )));
        }
        for pattern in rule.files.iter() {
            let pattern = pattern.strip_prefix('!').unwrap_or(pattern);
            compile_glob(pattern).map_err(|e| {
                BuildError::config(format!(
                    "watch rule '{}' has invalid pattern '{pattern}': {e}",
                    rule.name
                ))
            })?;
        }
        for member in rule.tasks.iter() {
            let parsed = MemberRef::parse(cfg, member).map_err(|err| {
                BuildError::config(format!(
                    "watch rule '{}' references undefined task '{member}' ({err})",
                    rule.name
                ))
            })?;
            if reaches_watch(cfg, parsed) {
                return Err(BuildError::config(format!(
                    "watch rule '{}' cannot run the watcher itself (via '{member}')",
                    rule.name
                )));
            }
        }
    }
    Ok(())
}

/// Whether running `member` would start the watcher. Requires acyclic aliases.
fn reaches_watch(cfg: &ConfigFile, member: MemberRef<'_>) -> bool {
    match member {
        MemberRef::Watch(_) => true,
        MemberRef::Alias(name) => cfg.alias(name).unwrap_or_default().iter().any(|m| {
            MemberRef::parse(cfg, m)
                .map(|r| reaches_watch(cfg, r))
                .unwrap_or(false)
        }),
        MemberRef::Task(_) | MemberRef::Target { .. } => false,
    }
}
