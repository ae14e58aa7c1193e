//! Trellis Modules - the module composition engine.
//!
//! A module is a declarative [`ModuleManifest`] plus a factory. This crate
//! turns a set of module and adapter sources into live module APIs:
//!
//! 1. [`discover`] groups sources into modules with their adapters.
//! 2. [`validate_all`] checks that declared capabilities and adapters match.
//! 3. [`ModuleRegistry`] and [`AdapterRegistry`] hold what was accepted.
//! 4. [`resolve_dependencies`] orders modules so dependencies come first.
//! 5. [`instantiate_module`] resolves capabilities, narrows them through
//!    adapters and calls the factory with a guarded [`FactoryContext`].
//!
//! Sequencing these steps is the kernel's job; every step here is usable on
//! its own.
//!
//! # Example
//!
//! ```rust
//! use trellis_modules::{ModuleApi, ModuleDefinition, ModuleManifest, SourceSet, discover};
//!
//! let definition = ModuleDefinition::new(ModuleManifest::new(), |_ctx| {
//!     Ok(ModuleApi::new().with_operation("ping", |_| async { Ok(serde_json::json!("pong")) }))
//! })
//! .unwrap();
//!
//! let sources = SourceSet::new().module("modules/health/module.rs", definition);
//! let modules = discover(sources).unwrap();
//! assert_eq!(modules[0].name.as_str(), "health");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapter;
pub mod api;
pub mod capability;
pub mod descriptor;
pub mod discovery;
pub mod emitter;
pub mod error;
pub mod governance;
pub mod injector;
pub mod instance;
pub mod manifest;
pub mod publisher;
pub mod registry;
pub mod resolver;

pub use adapter::{AdapterSet, CapabilityAdapter};
pub use api::{ModuleApi, OperationError, OperationFuture};
pub use capability::{
    Capability, CapabilityBundle, CapabilityError, CapabilityKind, CapabilitySource,
    PathScopedFactory, capability, resolve_storage_paths,
};
pub use descriptor::{
    FactoryContext, ModuleDefinition, ModuleDescriptor, ModuleFactory, ModuleName,
};
pub use discovery::{
    AdapterSource, DiscoveredModule, ModuleSource, SourceSet, discover, to_identifier,
};
pub use emitter::ScopedEmitter;
pub use error::{ModuleError, ModuleResult};
pub use governance::{
    GovernanceReport, GovernanceViolation, ViolationKind, validate_all, validate_module,
};
pub use injector::{InjectionContext, ModuleInstance, instantiate_module, resolve_capabilities};
pub use instance::{DependencyApis, InstanceTable};
pub use manifest::ModuleManifest;
pub use publisher::{ApiPublisher, NoopPublisher, PublishError};
pub use registry::{AdapterRegistry, ModuleRegistry};
pub use resolver::resolve_dependencies;
