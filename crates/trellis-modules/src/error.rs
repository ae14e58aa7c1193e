//! Error types for the module engine.

use thiserror::Error;

use crate::capability::CapabilityError;
use crate::governance::GovernanceReport;

/// Errors raised while discovering, validating, resolving or instantiating modules.
///
/// Every variant is a static configuration defect; none is retried.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A module name does not satisfy the naming rules.
    #[error("invalid module name '{name}': {reason}")]
    InvalidModuleName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A module manifest is structurally invalid.
    #[error("invalid module manifest: {0}")]
    InvalidManifest(String),

    /// Two module sources resolved to the same module name.
    #[error("module '{name}' is provided by both '{first}' and '{second}'")]
    DuplicateModule {
        /// The colliding module name.
        name: String,
        /// Path of the source seen first.
        first: String,
        /// Path of the source seen second.
        second: String,
    },

    /// Two adapter sources resolved to the same module and capability.
    #[error(
        "adapter '{capability}' of module '{module}' is provided by both '{first}' and '{second}'"
    )]
    DuplicateAdapter {
        /// Owning module.
        module: String,
        /// Adapted capability.
        capability: String,
        /// Path of the source seen first.
        first: String,
        /// Path of the source seen second.
        second: String,
    },

    /// Declared capabilities and adapters do not correspond.
    #[error("{0}")]
    Governance(GovernanceReport),

    /// A module name was registered twice.
    #[error("module '{name}' is already registered")]
    DuplicateRegistration {
        /// The duplicated name.
        name: String,
    },

    /// A module requires a module that is not registered.
    #[error("module '{dependent}' requires unregistered module '{missing}'")]
    MissingDependency {
        /// The module declaring the dependency.
        dependent: String,
        /// The dependency that could not be found.
        missing: String,
    },

    /// The dependency graph contains a cycle.
    #[error("circular dependency: {}", cycle.join(" -> "))]
    CircularDependency {
        /// The cycle, starting and ending with the same module.
        cycle: Vec<String>,
    },

    /// A module requires a capability that is not in the capability table.
    #[error("module '{module}' requires unknown capability '{capability}'")]
    UnknownCapability {
        /// The requiring module.
        module: String,
        /// The unknown capability name.
        capability: String,
    },

    /// A known capability was not supplied by the capability source.
    #[error("capability '{capability}' required by module '{module}' is not provided")]
    CapabilityUnavailable {
        /// The requiring module.
        module: String,
        /// The missing capability.
        capability: String,
    },

    /// A path-scoped capability factory failed.
    #[error("failed to create capability '{capability}' for module '{module}': {source}")]
    CapabilityFactoryFailed {
        /// The requiring module.
        module: String,
        /// The capability being created.
        capability: String,
        /// The factory error.
        source: CapabilityError,
    },

    /// A module's adapter rejected the raw capability.
    #[error("adapter '{capability}' of module '{module}' failed: {source}")]
    AdapterFailed {
        /// The owning module.
        module: String,
        /// The adapted capability.
        capability: String,
        /// The adapter error.
        source: CapabilityError,
    },

    /// A factory read a capability its module never declared.
    #[error("module '{module}' accessed undeclared capability '{capability}'")]
    UndeclaredCapabilityAccess {
        /// The accessing module.
        module: String,
        /// The capability key that was read.
        capability: String,
    },

    /// A capability was read as a type it does not have.
    #[error("capability '{capability}' of module '{module}' is not a {expected}")]
    CapabilityTypeMismatch {
        /// The accessing module.
        module: String,
        /// The capability key that was read.
        capability: String,
        /// The requested type.
        expected: &'static str,
    },

    /// A dependency API was not in the instance table when a dependent was built.
    #[error("module '{module}' depends on '{dependency}', which has not been instantiated")]
    DependencyNotInstantiated {
        /// The module being instantiated.
        module: String,
        /// The absent dependency.
        dependency: String,
    },

    /// A factory read a dependency API its module never declared.
    #[error("module '{module}' accessed undeclared dependency '{dependency}'")]
    UndeclaredDependencyAccess {
        /// The accessing module.
        module: String,
        /// The dependency that was read.
        dependency: String,
    },

    /// A module emitted an event name outside its allow-list.
    #[error(
        "module '{module}' emitted undeclared event '{event}' (declared: [{}])",
        allowed.join(", ")
    )]
    UndeclaredEventEmission {
        /// The emitting module.
        module: String,
        /// The attempted event name.
        event: String,
        /// Every declared event name.
        allowed: Vec<String>,
    },

    /// A module factory reported a failure of its own.
    #[error("factory for module '{module}' failed: {message}")]
    FactoryFailed {
        /// The module whose factory failed.
        module: String,
        /// The factory's message.
        message: String,
    },

    /// A module API was stored twice.
    #[error("module '{module}' has already been instantiated")]
    AlreadyInstantiated {
        /// The module name.
        module: String,
    },
}

impl ModuleError {
    /// Build a [`ModuleError::FactoryFailed`] from any displayable error.
    pub fn factory(module: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::FactoryFailed {
            module: module.into(),
            message: message.to_string(),
        }
    }
}

/// A specialized Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;
