//! Module and adapter registries.
//!
//! Both registries are filled once during boot and read-only afterwards.
//! Registering a name twice is a fatal configuration error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::adapter::{AdapterSet, CapabilityAdapter};
use crate::descriptor::{ModuleDefinition, ModuleDescriptor, ModuleName};
use crate::error::{ModuleError, ModuleResult};

/// Registered module descriptors, in registration order.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    descriptors: Vec<Arc<ModuleDescriptor>>,
    index: HashMap<ModuleName, usize>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::DuplicateRegistration`] if `name` is taken.
    /// Dependencies, including a module naming itself, are checked later by
    /// [`resolve_dependencies`](crate::resolve_dependencies).
    pub fn register(
        &mut self,
        name: ModuleName,
        definition: ModuleDefinition,
    ) -> ModuleResult<Arc<ModuleDescriptor>> {
        if self.index.contains_key(&name) {
            return Err(ModuleError::DuplicateRegistration {
                name: name.to_string(),
            });
        }

        let descriptor = Arc::new(ModuleDescriptor::new(name.clone(), definition));
        debug!(
            module = %name,
            capabilities = descriptor.required_capabilities().len(),
            dependencies = descriptor.required_modules().len(),
            "Registered module"
        );
        self.index.insert(name, self.descriptors.len());
        self.descriptors.push(Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Look a descriptor up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.index
            .get(name)
            .and_then(|&position| self.descriptors.get(position))
    }

    /// Registration position of `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered names, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&ModuleName> {
        self.descriptors.iter().map(|d| d.name()).collect()
    }

    /// Descriptors, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.descriptors.iter()
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no module is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Registered adapter sets, keyed by owning module.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    sets: HashMap<ModuleName, AdapterSet>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module's adapters.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::DuplicateRegistration`] if `module` already has adapters.
    pub fn register(&mut self, module: ModuleName, adapters: AdapterSet) -> ModuleResult<()> {
        if self.sets.contains_key(&module) {
            return Err(ModuleError::DuplicateRegistration {
                name: module.to_string(),
            });
        }
        debug!(module = %module, adapters = adapters.len(), "Registered adapters");
        self.sets.insert(module, adapters);
        Ok(())
    }

    /// All adapters of `module`.
    #[must_use]
    pub fn get(&self, module: &str) -> Option<&AdapterSet> {
        self.sets.get(module)
    }

    /// The adapter `module` registered for `capability`.
    #[must_use]
    pub fn adapter(&self, module: &str, capability: &str) -> Option<&CapabilityAdapter> {
        self.sets.get(module).and_then(|set| set.get(capability))
    }

    /// Whether `module` has registered adapters.
    #[must_use]
    pub fn contains(&self, module: &str) -> bool {
        self.sets.contains_key(module)
    }

    /// Number of modules with registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ModuleApi;
    use crate::manifest::ModuleManifest;

    fn definition(manifest: ModuleManifest) -> ModuleDefinition {
        ModuleDefinition::new(manifest, |_| Ok(ModuleApi::new())).unwrap()
    }

    fn name(s: &str) -> ModuleName {
        ModuleName::new(s).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ModuleRegistry::new();
        registry
            .register(name("personas"), definition(ModuleManifest::new()))
            .unwrap();
        registry
            .register(
                name("threads"),
                definition(ModuleManifest::new().depends_on("personas")),
            )
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("threads"));
        assert_eq!(registry.position("threads"), Some(1));
        assert_eq!(
            registry.get("threads").unwrap().required_modules(),
            ["personas"]
        );
        let names: Vec<_> = registry.names().into_iter().map(ModuleName::as_str).collect();
        assert_eq!(names, vec!["personas", "threads"]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ModuleRegistry::new();
        registry
            .register(name("a"), definition(ModuleManifest::new()))
            .unwrap();
        let err = registry
            .register(name("a"), definition(ModuleManifest::new()))
            .unwrap_err();
        assert_eq!(err.to_string(), "module 'a' is already registered");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_self_dependency_resolves_as_cycle() {
        let mut registry = ModuleRegistry::new();
        registry
            .register(name("a"), definition(ModuleManifest::new().depends_on("a")))
            .unwrap();
        assert_eq!(registry.len(), 1);

        match crate::resolver::resolve_dependencies(&registry).unwrap_err() {
            ModuleError::CircularDependency { cycle } => assert_eq!(cycle, vec!["a", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_adapter_registry() {
        let mut adapters = AdapterRegistry::new();
        adapters
            .register(
                name("threads"),
                AdapterSet::new().with("jsonFile", CapabilityAdapter::passthrough()),
            )
            .unwrap();

        assert!(adapters.adapter("threads", "jsonFile").is_some());
        assert!(adapters.adapter("threads", "http").is_none());
        assert!(adapters.adapter("personas", "jsonFile").is_none());

        let err = adapters
            .register(name("threads"), AdapterSet::new())
            .unwrap_err();
        assert!(matches!(err, ModuleError::DuplicateRegistration { .. }));
    }
}
