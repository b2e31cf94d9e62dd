//! Shared helpers for buildwatch integration tests: config builders, fake
//! tools and dispatchers, project fixtures on disk.

pub mod builders;
pub mod fake_dispatcher;
pub mod fake_tools;
pub mod fixtures;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use buildwatch::logging::LOG_ENV;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{parse_config, ConfigBuilder};
pub use fake_dispatcher::FakeDispatcher;
pub use fake_tools::{call_log, CallLog, FailingTool, RecordingTool};
pub use fixtures::write_tree;

/// Upper bound for anything a test awaits.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Install a test-captured subscriber once per test binary.
///
/// Same filter variable as the binary: `BUILDWATCH_LOG=debug cargo test`.
/// Output only shows for failing tests unless run with `--nocapture`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, failing the test after [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test timed out after {TEST_TIMEOUT:?}"),
    }
}
