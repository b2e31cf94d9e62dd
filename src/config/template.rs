// src/config/template.rs

//! `<%= path.to.value %>` interpolation over the raw TOML document.
//!
//! Lookup order for a path:
//! 1. under `[task]`, so `jshint.core.src` reads `[task.jshint.core].src`;
//! 2. from the document root (`config.package`, `alias.css`, ...);
//! 3. `pkg.*` from the JSON package manifest, if one is configured.
//!
//! `now` is the current time in milliseconds since the Unix epoch.
//!
//! A string made of exactly one template takes the referenced value as-is,
//! which lets `src = "<%= jshint.core.src %>"` reuse an array of globs.

use std::time::{SystemTime, UNIX_EPOCH};

use toml::{Table, Value};

use crate::errors::{BuildError, Result};

const OPEN: &str = "<%=";
const CLOSE: &str = "%>";
const MAX_DEPTH: usize = 16;

pub struct TemplateContext<'a> {
    doc: &'a Table,
    pkg: Option<&'a Value>,
    now_ms: i64,
}

impl<'a> TemplateContext<'a> {
    pub fn new(doc: &'a Table, pkg: Option<&'a Value>) -> Self {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self { doc, pkg, now_ms }
    }

    /// Resolve every string in the document.
    pub fn resolve_document(&self) -> Result<Table> {
        let mut out = Table::new();
        for (key, value) in self.doc.iter() {
            out.insert(key.clone(), self.resolve_value(value, 0)?);
        }
        Ok(out)
    }

    fn resolve_value(&self, value: &Value, depth: usize) -> Result<Value> {
        match value {
            Value::String(s) => self.resolve_string(s, depth),
            Value::Array(items) => items
                .iter()
                .map(|v| self.resolve_value(v, depth))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Table(table) => {
                let mut out = Table::new();
                for (k, v) in table.iter() {
                    out.insert(k.clone(), self.resolve_value(v, depth)?);
                }
                Ok(Value::Table(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, s: &str, depth: usize) -> Result<Value> {
        if !s.contains(OPEN) {
            return Ok(Value::String(s.to_string()));
        }
        if depth >= MAX_DEPTH {
            return Err(BuildError::TemplateError(format!(
                "template nesting deeper than {MAX_DEPTH} levels while resolving \"{s}\" (cycle?)"
            )));
        }

        if let Some(expr) = single_template(s) {
            let value = self.lookup(expr)?;
            return self.resolve_value(&value, depth + 1);
        }

        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len()..];
            let end = after.find(CLOSE).ok_or_else(|| {
                BuildError::TemplateError(format!("unterminated template in \"{s}\""))
            })?;
            let expr = after[..end].trim();
            let value = self.resolve_value(&self.lookup(expr)?, depth + 1)?;
            out.push_str(&render_scalar(expr, &value)?);
            rest = &after[end + CLOSE.len()..];
        }
        out.push_str(rest);

        Ok(Value::String(out))
    }

    fn lookup(&self, expr: &str) -> Result<Value> {
        if expr == "now" {
            return Ok(Value::Integer(self.now_ms));
        }

        let segments: Vec<&str> = expr.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(BuildError::TemplateError(format!(
                "invalid template path \"{expr}\""
            )));
        }

        if let Some(Value::Table(tasks)) = self.doc.get("task") {
            if let Some(v) = walk(tasks, &segments) {
                return Ok(v.clone());
            }
        }
        if let Some(v) = walk(self.doc, &segments) {
            return Ok(v.clone());
        }
        if let (["pkg", rest @ ..], Some(Value::Table(pkg))) = (segments.as_slice(), self.pkg) {
            if rest.is_empty() {
                return Ok(Value::Table(pkg.clone()));
            }
            if let Some(v) = walk(pkg, rest) {
                return Ok(v.clone());
            }
        }

        Err(BuildError::TemplateError(format!(
            "unknown template reference \"{expr}\""
        )))
    }
}

/// Resolve all templates in `doc` with an optional package manifest.
pub fn resolve_document(doc: &Table, pkg: Option<&Value>) -> Result<Table> {
    TemplateContext::new(doc, pkg).resolve_document()
}

/// If the whole (trimmed) string is one template, return its expression.
fn single_template(s: &str) -> Option<&str> {
    let inner = s.trim().strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    if inner.contains(OPEN) || inner.contains(CLOSE) {
        return None;
    }
    Some(inner.trim())
}

fn walk<'v>(table: &'v Table, segments: &[&str]) -> Option<&'v Value> {
    let (first, rest) = segments.split_first()?;
    let value = table.get(*first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        Value::Table(inner) => walk(inner, rest),
        Value::Array(items) => {
            let idx: usize = rest[0].parse().ok()?;
            let item = items.get(idx)?;
            match (item, &rest[1..]) {
                (v, []) => Some(v),
                (Value::Table(inner), tail) => walk(inner, tail),
                _ => None,
            }
        }
        _ => None,
    }
}

fn render_scalar(expr: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(d) => Ok(d.to_string()),
        Value::Array(items) => items
            .iter()
            .map(|v| render_scalar(expr, v))
            .collect::<Result<Vec<_>>>()
            .map(|parts| parts.join(",")),
        Value::Table(_) => Err(BuildError::TemplateError(format!(
            "\"{expr}\" is a table and cannot be interpolated into a string"
        ))),
    }
}

/// Convert a JSON package manifest into a TOML value so templates can walk it
/// uniformly. `null`s are dropped.
pub fn json_to_toml(value: serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Boolean(b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float)),
        serde_json::Value::String(s) => Some(Value::String(s)),
        serde_json::Value::Array(items) => Some(Value::Array(
            items.into_iter().filter_map(json_to_toml).collect(),
        )),
        serde_json::Value::Object(map) => {
            let mut table = Table::new();
            for (k, v) in map {
                if let Some(v) = json_to_toml(v) {
                    table.insert(k, v);
                }
            }
            Some(Value::Table(table))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(src: &str) -> Table {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn whole_string_template_takes_array_value() {
        let d = doc(
            r#"
            [task.jshint.core]
            src = ["build/js/*.js"]
            [task.jscs.core]
            src = "<%= jshint.core.src %>"
            "#,
        );
        let out = resolve_document(&d, None).unwrap();
        assert_eq!(
            out["task"]["jscs"]["core"]["src"],
            Value::Array(vec![Value::String("build/js/*.js".into())])
        );
    }

    #[test]
    fn embedded_templates_are_rendered_from_pkg() {
        let d = doc(r#"banner = "/*! <%= pkg.name %> v<%= pkg.version %> */""#);
        let pkg = json_to_toml(serde_json::json!({ "name": "begroup", "version": "1.2.0", "private": null }));
        let out = resolve_document(&d, pkg.as_ref()).unwrap();
        assert_eq!(out["banner"].as_str(), Some("/*! begroup v1.2.0 */"));
    }

    #[test]
    fn now_is_an_integer() {
        let d = doc(r#"stamp = "<%= now %>""#);
        let out = resolve_document(&d, None).unwrap();
        assert!(out["stamp"].as_integer().unwrap() > 0);
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let d = doc(r#"a = "<%= nope.nothing %>""#);
        let err = resolve_document(&d, None).unwrap_err();
        assert!(matches!(err, BuildError::TemplateError(msg) if msg.contains("nope.nothing")));
    }

    #[test]
    fn self_reference_hits_depth_limit() {
        let d = doc(r#"a = "x<%= a %>""#);
        assert!(matches!(
            resolve_document(&d, None),
            Err(BuildError::TemplateError(_))
        ));
    }

    #[test]
    fn plain_erb_style_tags_are_left_alone() {
        let d = doc(r#"a = "<% if x %>""#);
        let out = resolve_document(&d, None).unwrap();
        assert_eq!(out["a"].as_str(), Some("<% if x %>"));
    }
}
