//! The instance table and the dependency view handed to factories.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::api::ModuleApi;
use crate::descriptor::ModuleName;
use crate::error::{ModuleError, ModuleResult};

/// Published module APIs, in instantiation order.
///
/// Entries are only ever added; a second insert for the same module fails.
#[derive(Debug, Default)]
pub struct InstanceTable {
    apis: HashMap<ModuleName, Arc<ModuleApi>>,
    order: Vec<ModuleName>,
}

impl InstanceTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a module's published API.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::AlreadyInstantiated`] if `module` is already present.
    pub fn insert(&mut self, module: ModuleName, api: Arc<ModuleApi>) -> ModuleResult<()> {
        if self.apis.contains_key(&module) {
            return Err(ModuleError::AlreadyInstantiated {
                module: module.to_string(),
            });
        }
        self.order.push(module.clone());
        self.apis.insert(module, api);
        Ok(())
    }

    /// The API of `module`, if it has been instantiated.
    #[must_use]
    pub fn get(&self, module: &str) -> Option<Arc<ModuleApi>> {
        self.apis.get(module).map(Arc::clone)
    }

    /// Whether `module` has been instantiated.
    #[must_use]
    pub fn contains(&self, module: &str) -> bool {
        self.apis.contains_key(module)
    }

    /// Instantiated modules, in insertion order.
    #[must_use]
    pub fn names(&self) -> &[ModuleName] {
        &self.order
    }

    /// Number of instantiated modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing has been instantiated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Collect the APIs `module` declared in `required`.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::DependencyNotInstantiated`] for the first
    /// required module missing from the table.
    pub fn dependency_apis(
        &self,
        module: &ModuleName,
        required: &[String],
    ) -> ModuleResult<DependencyApis> {
        let mut apis = BTreeMap::new();
        for dependency in required {
            let api = self
                .get(dependency)
                .ok_or_else(|| ModuleError::DependencyNotInstantiated {
                    module: module.to_string(),
                    dependency: dependency.clone(),
                })?;
            apis.insert(dependency.clone(), api);
        }
        Ok(DependencyApis {
            module: module.clone(),
            apis,
        })
    }
}

/// The APIs of one module's declared dependencies.
#[derive(Debug, Clone)]
pub struct DependencyApis {
    module: ModuleName,
    apis: BTreeMap<String, Arc<ModuleApi>>,
}

impl DependencyApis {
    /// The API of a declared dependency.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::UndeclaredDependencyAccess`] if the module did
    /// not list `dependency` in `required_modules`.
    pub fn get(&self, dependency: &str) -> ModuleResult<Arc<ModuleApi>> {
        self.apis
            .get(dependency)
            .map(Arc::clone)
            .ok_or_else(|| ModuleError::UndeclaredDependencyAccess {
                module: self.module.to_string(),
                dependency: dependency.to_string(),
            })
    }

    /// Whether `dependency` is available.
    #[must_use]
    pub fn contains(&self, dependency: &str) -> bool {
        self.apis.contains_key(dependency)
    }

    /// Dependency names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.apis.keys().map(String::as_str)
    }

    /// Number of dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.apis.len()
    }

    /// Whether the module has no dependencies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}
