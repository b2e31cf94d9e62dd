use std::collections::BTreeMap;

use serde::Deserialize;
use toml::{Table, Value};

use crate::errors::{BuildError, Result};
use crate::types::{LiveReloadSetting, TriggerWhileRunningBehaviour};

/// Key reserved for shared options inside `[task.<tool>]` and `[watch]`.
pub const OPTIONS_KEY: &str = "options";

/// Name of the built-in watch task.
pub const WATCH_TASK: &str = "watch";

/// Name run when no task is given on the command line.
pub const DEFAULT_TASK: &str = "default";

/// Top-level configuration as read from a TOML file, after template
/// resolution but before any semantic validation.
///
/// ```toml
/// [config]
/// package = "package.json"
///
/// [tool.less]
/// cmd = "lessc"
/// args = ["{src}", "{dest}"]
/// per_file = true
/// flags = { compress = "--compress" }
///
/// [task.less.development.files]
/// "dist/css/style.css" = "build/less/style.less"
///
/// [alias]
/// css = ["less:development", "less:production", "replace"]
///
/// [watch.less]
/// files = ["build/less/*.less"]
/// tasks = ["css"]
/// ```
///
/// Task and watch tables stay untyped here: their keys are user-chosen
/// target/rule names mixed with the reserved `options` key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub tool: BTreeMap<String, ToolConfig>,

    #[serde(default)]
    pub task: Table,

    #[serde(default)]
    pub alias: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub watch: Table,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// JSON package manifest exposed to templates as `pkg`, relative to the
    /// config file.
    #[serde(default)]
    pub package: Option<String>,

    /// `"queue"` (default) or `"cancel"`.
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of queued watch batches to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
}

fn default_queue_length() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            package: None,
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
        }
    }
}

/// `[tool.<id>]`: how to invoke an external program.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Program to execute (looked up on `PATH`).
    pub cmd: String,

    /// Argument templates. `"{src}"` and `"{dest}"` as whole arguments expand
    /// to the file lists; `{task}`, `{target}` and `{dest}` are substituted
    /// inside other arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Invoke once per file mapping instead of once for all of them.
    #[serde(default)]
    pub per_file: bool,

    /// Option name -> command-line flag.
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
}

/// One group of source patterns and an optional destination.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileGroup {
    #[serde(default, deserialize_with = "one_or_many")]
    pub src: Vec<String>,

    #[serde(default)]
    pub dest: Option<String>,

    /// Base directory for `src` patterns (and for `expand` relative paths).
    #[serde(default)]
    pub cwd: Option<String>,

    /// Produce one mapping per matched source.
    #[serde(default)]
    pub expand: bool,

    /// Replacement extension for expanded destinations, e.g. `".min.js"`.
    #[serde(default)]
    pub ext: Option<String>,

    /// Drop directory components of expanded destinations.
    #[serde(default)]
    pub flatten: bool,
}

impl FileGroup {
    pub fn sources<I, S>(src: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            src: src.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// A named configuration of a task, addressed as `<tool>:<target>`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDefinition {
    pub name: String,
    pub options: Table,
    pub files: Vec<FileGroup>,
    /// Every other key of the target table (tool-specific payload).
    pub data: Table,
}

/// `[task.<tool>]`: the tool identifier plus its ordered targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub name: String,
    pub options: Table,
    pub targets: Vec<TargetDefinition>,
}

impl TaskDefinition {
    pub fn target(&self, name: &str) -> Option<&TargetDefinition> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Parse a `[task.<name>]` table. The `options` key is shared; all other
    /// keys are targets in declaration order.
    pub fn from_table(name: &str, table: &Table) -> Result<Self> {
        let mut options = Table::new();
        let mut targets = Vec::new();

        for (key, value) in table.iter() {
            if key == OPTIONS_KEY {
                options = expect_table(value, || format!("task '{name}': `options`"))?;
                continue;
            }
            targets.push(TargetDefinition::from_value(name, key, value)?);
        }

        if targets.is_empty() {
            return Err(BuildError::config(format!(
                "task '{name}' must define at least one target"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            options,
            targets,
        })
    }
}

impl TargetDefinition {
    fn from_value(task: &str, name: &str, value: &Value) -> Result<Self> {
        let label = format!("{task}:{name}");

        match value {
            // `dist = ["a.css", "b.css"]` is shorthand for `src = [...]`.
            Value::Array(_) => Ok(Self {
                name: name.to_string(),
                options: Table::new(),
                files: vec![FileGroup::sources(string_list(value, &label)?)],
                data: Table::new(),
            }),
            Value::Table(table) => {
                let mut options = Table::new();
                let mut files = Vec::new();
                let mut data = Table::new();
                let mut src: Option<Vec<String>> = None;
                let mut dest: Option<String> = None;

                for (key, v) in table.iter() {
                    match key.as_str() {
                        OPTIONS_KEY => {
                            options = expect_table(v, || format!("target '{label}': `options`"))?;
                        }
                        "files" => files.extend(parse_files_value(v, &label)?),
                        "src" => src = Some(string_list(v, &label)?),
                        "dest" => {
                            dest = Some(
                                v.as_str()
                                    .ok_or_else(|| {
                                        BuildError::config(format!(
                                            "target '{label}': `dest` must be a string"
                                        ))
                                    })?
                                    .to_string(),
                            )
                        }
                        _ => {
                            data.insert(key.clone(), v.clone());
                        }
                    }
                }

                match (src, dest) {
                    (Some(src), dest) => files.push(FileGroup {
                        src,
                        dest,
                        ..FileGroup::default()
                    }),
                    (None, Some(_)) => {
                        return Err(BuildError::config(format!(
                            "target '{label}' has `dest` without `src`"
                        )));
                    }
                    (None, None) => {}
                }

                Ok(Self {
                    name: name.to_string(),
                    options,
                    files,
                    data,
                })
            }
            other => Err(BuildError::config(format!(
                "target '{label}' must be a table or an array of sources, got {}",
                other.type_str()
            ))),
        }
    }
}

/// Parse the three accepted shapes of a `files` value.
fn parse_files_value(value: &Value, label: &str) -> Result<Vec<FileGroup>> {
    match value {
        Value::Table(map) => map
            .iter()
            .map(|(dest, src)| {
                Ok(FileGroup::sources(string_list(src, label)?).with_dest(dest.clone()))
            })
            .collect(),
        Value::Array(items) if items.iter().all(Value::is_str) => {
            Ok(vec![FileGroup::sources(string_list(value, label)?)])
        }
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.clone().try_into::<FileGroup>().map_err(|e| {
                    BuildError::config(format!("target '{label}': invalid `files` entry: {e}"))
                })
            })
            .collect(),
        other => Err(BuildError::config(format!(
            "target '{label}': `files` must be a table or an array, got {}",
            other.type_str()
        ))),
    }
}

fn string_list(value: &Value, label: &str) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    BuildError::config(format!(
                        "target '{label}': expected a string pattern, got {}",
                        v.type_str()
                    ))
                })
            })
            .collect(),
        other => Err(BuildError::config(format!(
            "target '{label}': expected a string or array of strings, got {}",
            other.type_str()
        ))),
    }
}

fn expect_table(value: &Value, what: impl FnOnce() -> String) -> Result<Table> {
    value
        .as_table()
        .cloned()
        .ok_or_else(|| BuildError::config(format!("{} must be a table", what())))
}

/// `[watch.options]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchOptions {
    /// Notify connected LiveReload viewers after a successful rebuild.
    #[serde(default)]
    pub livereload: LiveReloadSetting,

    /// Drop events for files whose content hash has not changed.
    #[serde(default)]
    pub skip_unchanged: bool,
}

/// `[watch.<rule>]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchRuleConfig {
    #[serde(skip)]
    pub name: String,

    #[serde(default, deserialize_with = "one_or_many")]
    pub files: Vec<String>,

    /// Members to run on change; may be empty (reload only).
    #[serde(default)]
    pub tasks: Vec<String>,

    /// Per-rule override of `[watch.options].livereload`.
    #[serde(default)]
    pub livereload: Option<LiveReloadSetting>,
}

impl WatchRuleConfig {
    /// Whether changes matched by this rule should reach LiveReload viewers.
    pub fn livereload_enabled(&self, options: &WatchOptions) -> bool {
        self.livereload
            .map(|l| l.is_enabled())
            .unwrap_or_else(|| options.livereload.is_enabled())
    }
}

/// Parsed `[watch]` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchSection {
    pub options: WatchOptions,
    pub rules: Vec<WatchRuleConfig>,
}

impl WatchSection {
    pub fn from_table(table: &Table) -> Result<Self> {
        let mut section = WatchSection::default();

        for (key, value) in table.iter() {
            if key == OPTIONS_KEY {
                section.options = value.clone().try_into().map_err(|e| {
                    BuildError::config(format!("invalid [watch.options]: {e}"))
                })?;
                continue;
            }

            let mut rule: WatchRuleConfig = value.clone().try_into().map_err(|e| {
                BuildError::config(format!("invalid watch rule '{key}': {e}"))
            })?;
            rule.name = key.clone();
            section.rules.push(rule);
        }

        Ok(section)
    }

    pub fn rule(&self, name: &str) -> Option<&WatchRuleConfig> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Validated configuration: the immutable task graph declaration.
///
/// Construct through [`TryFrom<RawConfigFile>`] (see `config::validate`) so
/// every alias member and watch task is known to resolve.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub tools: BTreeMap<String, ToolConfig>,
    pub tasks: Vec<TaskDefinition>,
    pub aliases: BTreeMap<String, Vec<String>>,
    pub watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        tools: BTreeMap<String, ToolConfig>,
        tasks: Vec<TaskDefinition>,
        aliases: BTreeMap<String, Vec<String>>,
        watch: WatchSection,
    ) -> Self {
        Self {
            config,
            tools,
            tasks,
            aliases,
            watch,
        }
    }

    pub fn task(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn alias(&self, name: &str) -> Option<&[String]> {
        self.aliases.get(name).map(Vec::as_slice)
    }
}

/// Deep-merge `over` into a copy of `base`. Nested tables merge key by key;
/// any other value in `over` replaces the one in `base`.
pub fn merge_tables(base: &Table, over: &Table) -> Table {
    let mut merged = base.clone();
    for (key, value) in over.iter() {
        match (merged.get_mut(key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                *existing = merge_tables(existing, incoming);
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> Table {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn targets_keep_declaration_order_and_skip_options() {
        let t = table(
            r#"
            options = { mangle = true }
            zeta = ["a.js"]
            alpha = { src = "b.js", dest = "out.js" }
            "#,
        );
        let def = TaskDefinition::from_table("uglify", &t).unwrap();
        let names: Vec<_> = def.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(def.options.get("mangle"), Some(&Value::Boolean(true)));
        assert_eq!(
            def.target("alpha").unwrap().files,
            vec![FileGroup::sources(["b.js"]).with_dest("out.js")]
        );
    }

    #[test]
    fn files_table_maps_dest_to_sources() {
        let t = table(
            r#"
            [development.files]
            "dist/a.css" = "build/a.less"
            "dist/b.css" = ["build/b.less", "build/c.less"]
            "#,
        );
        let def = TaskDefinition::from_table("less", &t).unwrap();
        let files = &def.targets[0].files;
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].dest.as_deref(), Some("dist/a.css"));
        assert_eq!(files[1].src, vec!["build/b.less", "build/c.less"]);
    }

    #[test]
    fn unknown_target_keys_become_data() {
        let t = table(
            r#"
            [fix]
            src = ["a.css"]
            overwrite = true
            replacements = [{ from = "a", to = "b" }]
            "#,
        );
        let def = TaskDefinition::from_table("replace", &t).unwrap();
        let target = &def.targets[0];
        assert!(target.data.contains_key("replacements"));
        assert_eq!(target.data.get("overwrite"), Some(&Value::Boolean(true)));
        assert!(!target.data.contains_key("src"));
    }

    #[test]
    fn task_without_targets_is_rejected() {
        let t = table("options = { a = 1 }");
        assert!(TaskDefinition::from_table("x", &t).is_err());
    }

    #[test]
    fn expand_groups_deserialize_from_files_array() {
        let t = table(
            r#"
            [dynamic]
            files = [{ expand = true, cwd = "build/img/", src = ["**/*.png"], dest = "dist/img/" }]
            "#,
        );
        let def = TaskDefinition::from_table("image", &t).unwrap();
        let group = &def.targets[0].files[0];
        assert!(group.expand);
        assert_eq!(group.cwd.as_deref(), Some("build/img/"));
    }

    #[test]
    fn merge_is_deep_and_target_wins() {
        let base = table("a = 1\n[nested]\nx = 1\ny = 2");
        let over = table("a = 2\n[nested]\ny = 3");
        let merged = merge_tables(&base, &over);
        assert_eq!(merged["a"], Value::Integer(2));
        assert_eq!(merged["nested"]["x"], Value::Integer(1));
        assert_eq!(merged["nested"]["y"], Value::Integer(3));
    }

    #[test]
    fn watch_rule_livereload_override() {
        let t = table(
            r#"
            options = { livereload = true }
            [html]
            files = ["*.html"]
            [js]
            files = "build/js/*.js"
            tasks = ["js"]
            livereload = false
            "#,
        );
        let watch = WatchSection::from_table(&t).unwrap();
        assert!(watch.rule("html").unwrap().livereload_enabled(&watch.options));
        assert!(!watch.rule("js").unwrap().livereload_enabled(&watch.options));
        assert_eq!(watch.rule("js").unwrap().files, vec!["build/js/*.js"]);
    }
}
