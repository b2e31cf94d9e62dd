use std::path::Path;

use buildwatch::config::{parse_and_validate, ConfigFile, RawConfigFile, ToolConfig};
use buildwatch::dag::TaskGraph;
use buildwatch::errors::Result;
use buildwatch::types::TriggerWhileRunningBehaviour;
use toml::{Table, Value};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Goes through the same `TryFrom<RawConfigFile>` validation as a loaded
/// file, so invalid graphs surface as errors from [`ConfigBuilder::try_build`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    raw: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn behaviour(mut self, behaviour: TriggerWhileRunningBehaviour) -> Self {
        self.raw.config.triggered_while_running_behaviour = behaviour;
        self
    }

    pub fn queue_length(mut self, n: usize) -> Self {
        self.raw.config.queue_length = n;
        self
    }

    /// `[tool.<name>]` running `cmd` with `{src}` and `{dest}` appended.
    pub fn tool(mut self, name: &str, cmd: &str) -> Self {
        self.raw.tool.insert(
            name.to_string(),
            ToolConfig {
                cmd: cmd.to_string(),
                args: vec!["{src}".into(), "{dest}".into()],
                ..ToolConfig::default()
            },
        );
        self
    }

    /// `[task.<task>.<target>]` with `src` patterns and an optional `dest`.
    pub fn target(mut self, task: &str, target: &str, src: &[&str], dest: Option<&str>) -> Self {
        let mut t = Table::new();
        t.insert(
            "src".into(),
            Value::Array(src.iter().map(|s| Value::String(s.to_string())).collect()),
        );
        if let Some(dest) = dest {
            t.insert("dest".into(), Value::String(dest.to_string()));
        }
        self.task_table(task).insert(target.to_string(), Value::Table(t));
        self
    }

    /// Set one key of `[task.<task>.<target>.options]` (or the task-level
    /// options when `target` is `None`).
    pub fn option(mut self, task: &str, target: Option<&str>, key: &str, value: impl Into<Value>) -> Self {
        let task_table = self.task_table(task);
        let owner = match target {
            Some(target) => table_entry(task_table, target),
            None => task_table,
        };
        table_entry(owner, "options").insert(key.to_string(), value.into());
        self
    }

    pub fn alias(mut self, name: &str, members: &[&str]) -> Self {
        self.raw
            .alias
            .insert(name.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn watch_rule(mut self, name: &str, files: &[&str], tasks: &[&str]) -> Self {
        let mut rule = Table::new();
        rule.insert(
            "files".into(),
            Value::Array(files.iter().map(|s| Value::String(s.to_string())).collect()),
        );
        rule.insert(
            "tasks".into(),
            Value::Array(tasks.iter().map(|s| Value::String(s.to_string())).collect()),
        );
        self.raw.watch.insert(name.to_string(), Value::Table(rule));
        self
    }

    pub fn livereload(mut self, enabled: bool) -> Self {
        let mut options = Table::new();
        options.insert("livereload".into(), Value::Boolean(enabled));
        self.raw.watch.insert("options".into(), Value::Table(options));
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.raw)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }

    pub fn build_graph(self) -> TaskGraph {
        TaskGraph::from_config(self.build())
    }

    fn task_table(&mut self, task: &str) -> &mut Table {
        table_entry(&mut self.raw.task, task)
    }
}

/// Sub-table `key` of `table`, created (or replacing a non-table) as needed.
fn table_entry<'t>(table: &'t mut Table, key: &str) -> &'t mut Table {
    let entry = table
        .entry(key.to_string())
        .or_insert_with(|| Value::Table(Table::new()));
    if !entry.is_table() {
        *entry = Value::Table(Table::new());
    }
    entry.as_table_mut().expect("entry was just made a table")
}

/// Parse and validate config text rooted at `root`.
pub fn parse_config(text: &str, root: &Path) -> ConfigFile {
    parse_and_validate(text, root).expect("config should be valid")
}
