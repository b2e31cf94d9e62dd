// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for
//! reading events from channels, dispatching runs and pushing reloads.
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! processes.

use std::collections::HashSet;

use crate::config::WatchSection;
use crate::engine::batch::TriggerBatch;
use crate::engine::event_handlers::{handle_files_changed, handle_run_completed, CoreCommand, CoreStep};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RunState, RuntimeEvent};
use crate::types::TriggerWhileRunningBehaviour;

/// What the core needs to know about each watch rule.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    runnable: HashSet<String>,
    livereload: HashSet<String>,
}

impl RuleTable {
    pub fn from_watch(watch: &WatchSection) -> Self {
        let mut table = Self::default();
        for rule in watch.rules.iter() {
            if !rule.tasks.is_empty() {
                table.runnable.insert(rule.name.clone());
            }
            if rule.livereload_enabled(&watch.options) {
                table.livereload.insert(rule.name.clone());
            }
        }
        table
    }

    /// Declare a rule directly (tests).
    pub fn with_rule(mut self, name: &str, has_tasks: bool, livereload: bool) -> Self {
        if has_tasks {
            self.runnable.insert(name.to_string());
        }
        if livereload {
            self.livereload.insert(name.to_string());
        }
        self
    }

    pub fn is_runnable(&self, rule: &str) -> bool {
        self.runnable.contains(rule)
    }

    pub fn reloads(&self, rule: &str) -> bool {
        self.livereload.contains(rule)
    }
}

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    rules: RuleTable,
    queue: TriggerQueue,
    state: RunState,
    current: Option<TriggerBatch>,
}

impl CoreRuntime {
    pub fn new(
        rules: RuleTable,
        behaviour: TriggerWhileRunningBehaviour,
        queue_length: usize,
    ) -> Self {
        Self {
            rules,
            queue: TriggerQueue::new(behaviour, queue_length),
            state: RunState::Idle,
            current: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Expose queue emptiness (for tests).
    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::FilesChanged(batch) => handle_files_changed(
                &mut self.state,
                &mut self.current,
                &mut self.queue,
                &self.rules,
                batch,
            ),
            RuntimeEvent::RunCompleted { success } => handle_run_completed(
                &mut self.state,
                &mut self.current,
                &mut self.queue,
                &self.rules,
                success,
            ),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: vec![CoreCommand::RequestExit],
                keep_running: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(behaviour: TriggerWhileRunningBehaviour) -> CoreRuntime {
        let rules = RuleTable::default()
            .with_rule("less", true, true)
            .with_rule("js", true, false)
            .with_rule("html", false, true)
            .with_rule("fonts", false, false);
        CoreRuntime::new(rules, behaviour, 1)
    }

    fn changed(rule: &str, path: &str) -> RuntimeEvent {
        RuntimeEvent::FilesChanged(TriggerBatch::single(rule, path))
    }

    #[test]
    fn change_while_idle_starts_a_run() {
        let mut core = core(TriggerWhileRunningBehaviour::Queue);
        let step = core.step(changed("less", "a.less"));
        assert_eq!(
            step.commands,
            vec![CoreCommand::StartRun(TriggerBatch::single("less", "a.less"))]
        );
        assert!(core.is_running());
    }

    #[test]
    fn reload_only_rules_reload_immediately_even_while_running() {
        let mut core = core(TriggerWhileRunningBehaviour::Queue);
        core.step(changed("js", "app.js"));

        let step = core.step(changed("html", "index.html"));
        assert_eq!(step.commands, vec![CoreCommand::Reload(vec!["index.html".into()])]);

        let step = core.step(changed("fonts", "f.woff"));
        assert!(step.commands.is_empty());
        assert!(core.queue_is_empty());
    }

    #[test]
    fn successful_run_reloads_livereload_rules_only() {
        let mut core = core(TriggerWhileRunningBehaviour::Queue);
        let mut batch = TriggerBatch::single("less", "a.less");
        batch.add("js", "app.js");
        core.step(RuntimeEvent::FilesChanged(batch));

        let step = core.step(RuntimeEvent::RunCompleted { success: true });
        assert_eq!(step.commands, vec![CoreCommand::Reload(vec!["a.less".into()])]);
        assert_eq!(core.state(), RunState::Succeeded);
    }

    #[test]
    fn failed_run_keeps_watching_without_reload() {
        let mut core = core(TriggerWhileRunningBehaviour::Queue);
        core.step(changed("less", "a.less"));
        let step = core.step(RuntimeEvent::RunCompleted { success: false });
        assert!(step.keep_running);
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), RunState::Failed);

        let step = core.step(changed("less", "a.less"));
        assert!(matches!(step.commands[..], [CoreCommand::StartRun(_)]));
    }

    #[test]
    fn triggers_during_a_run_are_queued_then_started() {
        let mut core = core(TriggerWhileRunningBehaviour::Queue);
        core.step(changed("less", "a.less"));

        assert!(core.step(changed("js", "app.js")).commands.is_empty());
        assert!(core.step(changed("less", "b.less")).commands.is_empty());
        assert!(!core.queue_is_empty());

        let step = core.step(RuntimeEvent::RunCompleted { success: true });
        let mut expected = TriggerBatch::single("js", "app.js");
        expected.add("less", "b.less");
        assert_eq!(
            step.commands,
            vec![
                CoreCommand::Reload(vec!["a.less".into()]),
                CoreCommand::StartRun(expected),
            ]
        );
        assert!(core.is_running());
    }

    #[test]
    fn cancel_mode_only_keeps_latest_trigger() {
        let mut core = core(TriggerWhileRunningBehaviour::Cancel);
        core.step(changed("less", "a.less"));
        core.step(changed("js", "app.js"));
        core.step(changed("less", "b.less"));

        let step = core.step(RuntimeEvent::RunCompleted { success: false });
        assert_eq!(
            step.commands,
            vec![CoreCommand::StartRun(TriggerBatch::single("less", "b.less"))]
        );
    }

    #[test]
    fn stray_completion_is_ignored_and_shutdown_exits() {
        let mut core = core(TriggerWhileRunningBehaviour::Queue);
        let step = core.step(RuntimeEvent::RunCompleted { success: true });
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), RunState::Idle);

        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(!step.keep_running);
        assert_eq!(step.commands, vec![CoreCommand::RequestExit]);
    }
}
