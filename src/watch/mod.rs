// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling each watch rule's glob patterns.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Optionally dropping events whose content hash did not change.
//! - Serving LiveReload clients.
//!
//! It does **not** know about tasks; it only turns filesystem changes into
//! rule-level triggers.

pub mod cache;
pub mod event_handler;
pub mod livereload;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use cache::FileCache;
pub use event_handler::EventProcessor;
pub use patterns::{collect_matching_files, compile_rules, WatchRule};
pub use watcher::{spawn_watcher, WatcherHandle};
