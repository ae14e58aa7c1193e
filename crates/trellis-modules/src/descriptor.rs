//! Module descriptors and the factory contract.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::ModuleApi;
use crate::capability::CapabilityBundle;
use crate::emitter::ScopedEmitter;
use crate::error::{ModuleError, ModuleResult};
use crate::instance::DependencyApis;
use crate::manifest::ModuleManifest;

/// Unique, stable, human-readable module identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleName(String);

impl<'de> Deserialize<'de> for ModuleName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl ModuleName {
    /// Create a validated module name.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidModuleName`] if the name is empty or
    /// contains anything other than ASCII alphanumerics, `-` and `_`.
    pub fn new(name: impl Into<String>) -> ModuleResult<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Borrow the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> ModuleResult<()> {
        if name.is_empty() {
            return Err(ModuleError::InvalidModuleName {
                name: name.to_string(),
                reason: "module name must not be empty".into(),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ModuleError::InvalidModuleName {
                name: name.to_string(),
                reason: "only ASCII alphanumerics, '-' and '_' are allowed".into(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Everything a factory receives: the APIs of its declared dependencies, its
/// guarded capability bundle and its scoped emitter.
#[derive(Debug)]
pub struct FactoryContext {
    /// The module being instantiated.
    pub module: ModuleName,
    /// APIs of the module's declared dependencies.
    pub dependencies: DependencyApis,
    /// Capabilities resolved for the module; undeclared reads fail.
    pub capabilities: CapabilityBundle,
    /// Emitter restricted to the module's declared events.
    pub emitter: ScopedEmitter,
}

/// Builds a module's API from its context.
pub type ModuleFactory = Arc<dyn Fn(FactoryContext) -> ModuleResult<ModuleApi> + Send + Sync>;

/// A module's manifest paired with its factory, before a name is assigned.
#[derive(Clone)]
pub struct ModuleDefinition {
    manifest: ModuleManifest,
    factory: ModuleFactory,
}

impl ModuleDefinition {
    /// Create a definition from a manifest and a factory.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidManifest`] if the manifest fails validation.
    pub fn new<F>(manifest: ModuleManifest, factory: F) -> ModuleResult<Self>
    where
        F: Fn(FactoryContext) -> ModuleResult<ModuleApi> + Send + Sync + 'static,
    {
        manifest.validate()?;
        Ok(Self {
            manifest,
            factory: Arc::new(factory),
        })
    }

    /// Create a definition from a TOML manifest and a factory.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidManifest`] if the TOML is malformed or invalid.
    pub fn from_toml<F>(manifest: &str, factory: F) -> ModuleResult<Self>
    where
        F: Fn(FactoryContext) -> ModuleResult<ModuleApi> + Send + Sync + 'static,
    {
        Self::new(ModuleManifest::from_toml_str(manifest)?, factory)
    }

    /// The declarative manifest.
    #[must_use]
    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

/// A registered module: its name and definition. Never mutated after registration.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    name: ModuleName,
    definition: ModuleDefinition,
}

impl ModuleDescriptor {
    /// Bind a definition to its name.
    #[must_use]
    pub fn new(name: ModuleName, definition: ModuleDefinition) -> Self {
        Self { name, definition }
    }

    /// The module name.
    #[must_use]
    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    /// The declarative manifest.
    #[must_use]
    pub fn manifest(&self) -> &ModuleManifest {
        &self.definition.manifest
    }

    /// Declared capability names, in injection order.
    #[must_use]
    pub fn required_capabilities(&self) -> &[String] {
        &self.definition.manifest.required_capabilities
    }

    /// Declared dependency names.
    #[must_use]
    pub fn required_modules(&self) -> &[String] {
        &self.definition.manifest.required_modules
    }

    /// Event names the module may emit.
    #[must_use]
    pub fn declared_events(&self) -> &[String] {
        &self.definition.manifest.declared_events
    }

    /// Storage prefixes for path-scoped capabilities.
    #[must_use]
    pub fn storage_paths(&self) -> &[String] {
        &self.definition.manifest.storage_paths
    }

    /// Run the module's factory.
    pub(crate) fn build(&self, context: FactoryContext) -> ModuleResult<ModuleApi> {
        (self.definition.factory)(context)
    }
}
