#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::module_name_repetitions)]

//! Trellis Kernel - boots a set of modules into live APIs.
//!
//! The kernel owns the boot sequence and nothing else: it runs discovery,
//! governance, registration, dependency resolution and per-module
//! instantiation from `trellis_modules` in that order, publishes each API as
//! it is built, and reports lifecycle transitions on the event bus.
//!
//! ```rust,ignore
//! use trellis_kernel::{BootConfig, Kernel};
//!
//! let config = BootConfig::load(Path::new("trellis.toml"))?;
//! let mut kernel = Kernel::new(config, capabilities)?;
//! kernel.boot(sources)?;
//! let threads = kernel.get_module("threads");
//! ```

/// Boot configuration loading.
pub mod config;
/// Kernel error types.
pub mod error;
/// The boot orchestrator.
pub mod kernel;
/// Boot state machine.
pub mod state;

pub use config::{BootConfig, ConfigError, ConfigResult, DATA_ROOT_ENV};
pub use error::{KernelError, KernelResult};
pub use kernel::Kernel;
pub use state::BootState;
pub use trellis_modules::{ApiPublisher, NoopPublisher, PublishError};
