//! Shared test harness for integration tests.

use std::sync::Arc;

use trellis_kernel::{ApiPublisher, BootConfig, Kernel, KernelError};
use trellis_test::{
    MemoryLogger, ModuleFixture, RecordingPublisher, TestContext, fake_capabilities_with_logger,
    setup_test_logging_default, sources,
};

/// A kernel wired to in-memory capabilities and a recording publisher.
///
/// Owns the `TestContext` whose temporary directory is the data root.
#[allow(dead_code)]
pub struct KernelHarness {
    /// The kernel under test.
    pub kernel: Kernel,
    /// Every API the kernel published.
    pub publisher: Arc<RecordingPublisher>,
    /// The shared `logger` capability.
    pub logger: Arc<MemoryLogger>,
    /// Holds the temporary data root.
    pub ctx: TestContext,
}

#[allow(dead_code)]
impl KernelHarness {
    /// Build an unbooted kernel.
    pub fn new() -> Self {
        Self::with_publisher(RecordingPublisher::new())
    }

    /// Build an unbooted kernel around a specific publisher.
    pub fn with_publisher(publisher: RecordingPublisher) -> Self {
        setup_test_logging_default();

        let ctx = TestContext::new();
        let logger = Arc::new(MemoryLogger::default());
        let publisher = Arc::new(publisher);
        let config = BootConfig::default().with_data_root(ctx.data_root());
        let kernel = Kernel::new(config, fake_capabilities_with_logger(Arc::clone(&logger)))
            .unwrap()
            .with_publisher(Arc::clone(&publisher) as Arc<dyn ApiPublisher>);

        Self {
            kernel,
            publisher,
            logger,
            ctx,
        }
    }

    /// Boot `fixtures`, in source order.
    pub fn boot(
        &mut self,
        fixtures: impl IntoIterator<Item = ModuleFixture>,
    ) -> Result<(), KernelError> {
        self.kernel.boot(sources(fixtures))
    }
}

/// Boot `fixtures` and expect success.
#[allow(dead_code)]
pub fn booted(fixtures: impl IntoIterator<Item = ModuleFixture>) -> KernelHarness {
    let mut harness = KernelHarness::new();
    harness.boot(fixtures).unwrap();
    harness
}

/// Boot `fixtures` and expect failure.
#[allow(dead_code)]
pub fn boot_error(fixtures: impl IntoIterator<Item = ModuleFixture>) -> KernelError {
    let mut harness = KernelHarness::new();
    harness.boot(fixtures).unwrap_err()
}
