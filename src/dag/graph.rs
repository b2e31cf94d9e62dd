// src/dag/graph.rs

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::model::{merge_tables, ConfigFile, DEFAULT_TASK, WATCH_TASK};
use crate::config::MemberRef;
use crate::dag::plan::{ExecutionPlan, TaskInvocation, WatchStep};
use crate::errors::{BuildError, Result};

/// One element of an expanded member list.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Invoke(TaskInvocation),
    Watch(WatchStep),
}

/// The immutable task graph: task definitions, composite tasks and watch
/// rules from a validated [`ConfigFile`].
///
/// Validation already guarantees that every alias member resolves and that
/// aliases are acyclic, so expansion here only fails for names requested at
/// runtime (e.g. from the command line).
#[derive(Debug, Clone)]
pub struct TaskGraph {
    cfg: ConfigFile,
}

impl TaskGraph {
    pub fn from_config(cfg: ConfigFile) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.cfg
    }

    /// Names runnable from the command line: tasks, `task:target`s, aliases
    /// and `watch[:rule]`.
    pub fn runnable_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for task in self.cfg.tasks.iter() {
            names.push(task.name.clone());
            for target in task.targets.iter() {
                names.push(format!("{}:{}", task.name, target.name));
            }
        }
        names.extend(self.cfg.aliases.keys().cloned());
        if !self.cfg.watch.is_empty() {
            names.push(WATCH_TASK.to_string());
            for rule in self.cfg.watch.rules.iter() {
                names.push(format!("{WATCH_TASK}:{}", rule.name));
            }
        }
        names
    }

    /// Build the invocation payload for `task:target`.
    pub fn invocation(&self, task: &str, target: &str) -> Result<TaskInvocation> {
        let def = self
            .cfg
            .task(task)
            .ok_or_else(|| BuildError::TaskNotFound(task.to_string()))?;
        let tgt = def
            .target(target)
            .ok_or_else(|| BuildError::TaskNotFound(format!("{task}:{target}")))?;

        Ok(TaskInvocation {
            task: def.name.clone(),
            target: tgt.name.clone(),
            options: merge_tables(&def.options, &tgt.options),
            files: tgt.files.clone(),
            data: tgt.data.clone(),
        })
    }

    /// Expand one member into its ordered steps.
    pub fn expand(&self, member: &str) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        self.expand_into(member, &mut steps)?;
        Ok(steps)
    }

    fn expand_into(&self, member: &str, out: &mut Vec<Step>) -> Result<()> {
        match MemberRef::parse(&self.cfg, member)? {
            MemberRef::Watch(rule) => out.push(Step::Watch(WatchStep {
                rule: rule.map(str::to_string),
            })),
            MemberRef::Alias(name) => {
                for inner in self.cfg.alias(name).unwrap_or_default() {
                    self.expand_into(inner, out)?;
                }
            }
            MemberRef::Task(task) => {
                let def = self
                    .cfg
                    .task(task)
                    .ok_or_else(|| BuildError::TaskNotFound(task.to_string()))?;
                for target in def.targets.iter() {
                    out.push(Step::Invoke(self.invocation(task, &target.name)?));
                }
            }
            MemberRef::Target { task, target } => {
                out.push(Step::Invoke(self.invocation(task, target)?));
            }
        }
        Ok(())
    }

    /// Resolve the names requested on the command line into a plan.
    ///
    /// - No names means `default`. Without a `default` alias, `default` falls
    ///   back to `watch` when watch rules exist.
    /// - A watch step ends the plan; anything after it would never run and is
    ///   dropped with a warning.
    pub fn plan(&self, requested: &[String]) -> Result<ExecutionPlan> {
        let requested: Vec<String> = if requested.is_empty() {
            vec![DEFAULT_TASK.to_string()]
        } else {
            requested.to_vec()
        };

        let mut plan = ExecutionPlan {
            requested: requested.clone(),
            ..ExecutionPlan::default()
        };

        for name in requested.iter() {
            let steps = if name == DEFAULT_TASK
                && self.cfg.alias(DEFAULT_TASK).is_none()
                && !self.cfg.watch.is_empty()
            {
                debug!("no `default` alias; defaulting to the watcher");
                vec![Step::Watch(WatchStep { rule: None })]
            } else {
                self.expand(name)?
            };

            for step in steps {
                if let Some(watch) = &plan.watch {
                    warn!(
                        watch_rule = ?watch.rule,
                        dropped = ?step,
                        "step after `watch` will never run; dropping it"
                    );
                    continue;
                }
                match step {
                    Step::Invoke(inv) => plan.invocations.push(inv),
                    Step::Watch(w) => plan.watch = Some(w),
                }
            }
        }

        Ok(plan)
    }

    /// Invocations a watch rule runs on change (empty for reload-only rules).
    pub fn rule_invocations(&self, rule: &str) -> Result<Vec<TaskInvocation>> {
        let def = self
            .cfg
            .watch
            .rule(rule)
            .ok_or_else(|| BuildError::TaskNotFound(format!("{WATCH_TASK}:{rule}")))?;

        let mut invocations = Vec::new();
        for member in def.tasks.iter() {
            for step in self.expand(member)? {
                match step {
                    Step::Invoke(inv) => invocations.push(inv),
                    Step::Watch(_) => {
                        return Err(BuildError::config(format!(
                            "watch rule '{rule}' cannot run the watcher itself"
                        )));
                    }
                }
            }
        }
        Ok(invocations)
    }

    /// Invocations for several triggered rules, in rule order. An invocation
    /// reached through more than one rule runs once, at its first position.
    pub fn batch_invocations<S: AsRef<str>>(&self, rules: &[S]) -> Result<Vec<TaskInvocation>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for rule in rules {
            for inv in self.rule_invocations(rule.as_ref())? {
                if seen.insert(inv.label()) {
                    out.push(inv);
                }
            }
        }
        Ok(out)
    }
}
