// src/engine/batch.rs

use super::RuleName;

/// Changed paths matched to one watch rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleChange {
    pub rule: RuleName,
    /// Root-relative, `/`-separated.
    pub paths: Vec<String>,
}

/// Rules triggered together, in first-trigger order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerBatch {
    entries: Vec<RuleChange>,
}

impl TriggerBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(rule: impl Into<RuleName>, path: impl Into<String>) -> Self {
        let mut batch = Self::new();
        batch.add(rule, path);
        batch
    }

    /// Record `path` under `rule`; duplicates are ignored.
    pub fn add(&mut self, rule: impl Into<RuleName>, path: impl Into<String>) {
        let rule = rule.into();
        let path = path.into();
        match self.entries.iter_mut().find(|e| e.rule == rule) {
            Some(entry) => {
                if !entry.paths.contains(&path) {
                    entry.paths.push(path);
                }
            }
            None => self.entries.push(RuleChange {
                rule,
                paths: vec![path],
            }),
        }
    }

    pub fn merge(&mut self, other: TriggerBatch) {
        for entry in other.entries {
            for path in entry.paths {
                self.add(entry.rule.clone(), path);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RuleChange] {
        &self.entries
    }

    pub fn rules(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.rule.as_str()).collect()
    }

    /// Split into (entries matching `pred`, the rest), preserving order.
    pub fn partition(self, pred: impl Fn(&str) -> bool) -> (TriggerBatch, TriggerBatch) {
        let (yes, no): (Vec<_>, Vec<_>) = self.entries.into_iter().partition(|e| pred(&e.rule));
        (TriggerBatch { entries: yes }, TriggerBatch { entries: no })
    }

    /// De-duplicated paths of the entries whose rule satisfies `pred`.
    pub fn paths_where(&self, pred: impl Fn(&str) -> bool) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for entry in self.entries.iter().filter(|e| pred(&e.rule)) {
            for path in entry.paths.iter() {
                if !out.contains(path) {
                    out.push(path.clone());
                }
            }
        }
        out
    }
}
