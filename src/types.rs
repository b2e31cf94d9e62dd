use serde::Deserialize;

/// Behaviour when files change while a triggered run is still in progress.
///
/// - `Queue`: remember the trigger and start another run when the current one
///   finishes (default behaviour).
/// - `Cancel`: drop any previously queued batch and only keep the latest
///   trigger. The running batch itself is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

/// Default LiveReload port, shared with the browser extensions.
pub const DEFAULT_LIVERELOAD_PORT: u16 = 35729;

/// `livereload = true | false | <port>` as written in `[watch.options]` or on
/// a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LiveReloadSetting {
    Enabled(bool),
    Port(u16),
}

impl Default for LiveReloadSetting {
    fn default() -> Self {
        LiveReloadSetting::Enabled(false)
    }
}

impl LiveReloadSetting {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, LiveReloadSetting::Enabled(false))
    }

    /// Port to listen on, or `None` when disabled.
    pub fn port(&self) -> Option<u16> {
        match self {
            LiveReloadSetting::Enabled(false) => None,
            LiveReloadSetting::Enabled(true) => Some(DEFAULT_LIVERELOAD_PORT),
            LiveReloadSetting::Port(p) => Some(*p),
        }
    }
}
