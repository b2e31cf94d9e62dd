// src/dag/mod.rs

//! Task graph resolution.
//!
//! - [`graph`] holds the validated task/alias/watch declarations and expands
//!   names into ordered steps.
//! - [`plan`] contains the resolved [`ExecutionPlan`] and the per-step
//!   [`TaskInvocation`] payload handed to tools.

pub mod graph;
pub mod plan;

pub use graph::{Step, TaskGraph};
pub use plan::{ExecutionPlan, TaskInvocation, WatchStep};
