use thiserror::Error;
use trellis_modules::{ModuleError, PublishError};

use crate::config::ConfigError;

/// Errors that abort a boot.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Discovery, governance, registration, resolution or instantiation failed.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// The boot configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `boot` was called on a kernel that already left the created state.
    #[error("kernel cannot boot from state '{state}'")]
    AlreadyBooted {
        /// The state the kernel was in.
        state: String,
    },

    /// The API publisher refused a module.
    #[error("failed to publish module '{module}': {source}")]
    Publish {
        /// The module whose API was refused.
        module: String,
        /// The publisher's error.
        source: PublishError,
    },

    /// Resolution produced a name the registry does not hold.
    #[error("resolved module '{module}' is not registered")]
    UnregisteredModule {
        /// The unknown name.
        module: String,
    },
}

/// A specialized Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
