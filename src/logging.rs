// src/logging.rs

//! Diagnostics go to stderr through `tracing`; stdout is reserved for build
//! progress (`Running "less:production" (less) task`) and tool output.
//!
//! The filter comes from, in order: `--log-level`, then `BUILDWATCH_LOG`
//! (any `EnvFilter` directive, e.g. `buildwatch=debug,notify=warn`), then
//! `info`.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "BUILDWATCH_LOG";

/// Directives appended to level-only filters; the HTTP stack is chatty.
const QUIET_DEPS: &str = "hyper=warn,axum=warn";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("cannot install log subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    let from_env = || {
        env.map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| EnvFilter::try_new(s).ok())
    };

    match cli_level {
        Some(level) => level_filter(level_name(level)),
        None => from_env().unwrap_or_else(|| level_filter("info")),
    }
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("{level},{QUIET_DEPS}"))
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
