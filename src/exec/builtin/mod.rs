// src/exec/builtin/mod.rs

//! File-level tools that need no external program.

use crate::exec::backend::ToolRegistry;

mod clean;
mod concat;
mod notify;
mod replace;

pub use clean::Clean;
pub use concat::Concat;
pub use notify::Notify;
pub use replace::Replace;

/// Identifiers usable under `[task]` without a `[tool]` declaration.
pub const BUILTIN_TOOLS: &[&str] = &["clean", "concat", "notify", "replace"];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_TOOLS.contains(&name)
}

pub(crate) fn register_builtins(registry: &mut ToolRegistry) {
    registry.register("clean", Clean);
    registry.register("concat", Concat);
    registry.register("notify", Notify);
    registry.register("replace", Replace);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_is_registered() {
        let registry = ToolRegistry::with_builtins();
        for name in BUILTIN_TOOLS {
            assert!(registry.contains(name), "{name} not registered");
        }
        assert!(!is_builtin("watch"));
    }
}
