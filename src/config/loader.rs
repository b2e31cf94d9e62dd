// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::template::{json_to_toml, resolve_document};
use crate::errors::{BuildError, Result};

/// Default config file name, looked up in the current working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Buildwatch.toml";

/// Load a configuration file and return the raw `RawConfigFile`.
///
/// This parses TOML and resolves `<%= ... %>` templates, but does **not**
/// perform semantic validation (alias resolution, cycles, tools). Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        BuildError::config(format!("cannot read config file {}: {e}", path.display()))
    })?;
    parse_raw(&contents, &base_dir(path))
}

/// Parse raw config text. `base_dir` is where relative paths in `[config]`
/// (e.g. `package`) are resolved.
pub fn parse_raw(contents: &str, base_dir: &Path) -> Result<RawConfigFile> {
    let doc: Table = toml::from_str(contents)?;
    let pkg = load_package(&doc, base_dir)?;
    let resolved = resolve_document(&doc, pkg.as_ref())?;
    let raw: RawConfigFile = Value::Table(resolved).try_into()?;
    Ok(raw)
}

/// Load a configuration file from path and validate it.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML and resolves templates.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Parses task targets and watch rules.
/// - Checks that every alias member and watch task resolves, that aliases are
///   acyclic, and that every task names a known tool.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw)?;
    debug!(
        tasks = config.tasks.len(),
        aliases = config.aliases.len(),
        rules = config.watch.rules.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Parse and validate config text in one go.
pub fn parse_and_validate(contents: &str, base_dir: &Path) -> Result<ConfigFile> {
    ConfigFile::try_from(parse_raw(contents, base_dir)?)
}

/// Directory that relative paths in the config are resolved against.
///
/// A bare file name (parent = "") resolves against ".".
pub fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn load_package(doc: &Table, base_dir: &Path) -> Result<Option<Value>> {
    let Some(rel) = doc
        .get("config")
        .and_then(Value::as_table)
        .and_then(|c| c.get("package"))
        .and_then(Value::as_str)
    else {
        return Ok(None);
    };

    let path = base_dir.join(rel);
    let text = fs::read_to_string(&path).map_err(|e| {
        BuildError::config(format!("cannot read package manifest {}: {e}", path.display()))
    })?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    Ok(json_to_toml(json))
}
