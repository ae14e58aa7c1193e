//! Test harness utilities.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use trellis_events::{EventReceiver, TrellisEvent};

/// Set up test logging with the given filter.
///
/// Safe to call from many tests; only the first call installs a subscriber.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging with the default filter (warn level).
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}

/// A temporary data root for path-scoped capabilities and config files.
#[derive(Debug)]
pub struct TestContext {
    /// Temporary directory for the test.
    pub dir: TempDir,
}

impl TestContext {
    /// Create a new test context.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap_or_else(|e| panic!("failed to create temp dir: {e}")),
        }
    }

    /// The temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The data root inside the temporary directory.
    #[must_use]
    pub fn data_root(&self) -> PathBuf {
        self.dir.path().join("data")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain every event already buffered in `receiver`.
pub fn drain_events(receiver: &mut EventReceiver) -> Vec<Arc<TrellisEvent>> {
    std::iter::from_fn(|| receiver.try_recv()).collect()
}

/// Event types of every buffered event, in order.
pub fn drain_event_types(receiver: &mut EventReceiver) -> Vec<&'static str> {
    drain_events(receiver)
        .iter()
        .map(|event| event.event_type())
        .collect()
}
