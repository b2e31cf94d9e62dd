// src/config/mod.rs

//! Configuration loading and validation for buildwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Resolve `<%= ... %>` templates (`template.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate startup invariants: every alias member resolves, no alias
//!   cycles, every task has a tool (`validate.rs`).

pub mod loader;
pub mod model;
pub mod template;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_and_validate, DEFAULT_CONFIG_FILE};
pub use model::{
    ConfigFile, ConfigSection, FileGroup, RawConfigFile, TargetDefinition, TaskDefinition,
    ToolConfig, WatchOptions, WatchRuleConfig, WatchSection,
};
pub use validate::MemberRef;
