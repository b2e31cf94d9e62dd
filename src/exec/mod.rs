// src/exec/mod.rs

//! Tool execution layer.
//!
//! - [`backend`] provides the [`Tool`] trait, the [`ToolContext`] shared by
//!   all invocations and the [`ToolRegistry`] the runner dispatches through.
//! - [`command`] runs configured external programs with `tokio::process`.
//! - [`builtin`] holds the file-level tools that need no external program.
//! - [`files`] expands declarative file groups into concrete mappings.

pub mod backend;
pub mod builtin;
pub mod command;
pub mod files;

pub use backend::{Tool, ToolContext, ToolFuture, ToolRegistry};
pub use command::ExternalTool;
pub use files::{FileMapping, MatchKind};
