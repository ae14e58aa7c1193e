//! Module fixtures laid out the way discovery expects them.

use std::path::PathBuf;
use std::sync::Arc;

use trellis_modules::{
    CapabilityAdapter, FactoryContext, ModuleApi, ModuleDefinition, ModuleManifest, ModuleResult,
    SourceSet,
};

/// Root under which fixture sources are placed.
pub const FIXTURE_ROOT: &str = "modules";

type FixtureFactory = Arc<dyn Fn(FactoryContext) -> ModuleResult<ModuleApi> + Send + Sync>;

/// Builder for one module plus its adapters.
///
/// By default every declared capability gets a passthrough adapter, so the
/// fixture passes governance; use [`without_adapters`](Self::without_adapters)
/// or [`adapter`](Self::adapter) to change that.
#[derive(Clone)]
pub struct ModuleFixture {
    name: String,
    manifest: ModuleManifest,
    factory: FixtureFactory,
    auto_adapters: bool,
    adapters: Vec<(String, CapabilityAdapter)>,
}

impl ModuleFixture {
    /// A module with an empty manifest whose factory returns an empty API.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manifest: ModuleManifest::new(),
            factory: Arc::new(|_| Ok(ModuleApi::new())),
            auto_adapters: true,
            adapters: Vec::new(),
        }
    }

    /// Declare a capability.
    #[must_use]
    pub fn capability(mut self, name: impl Into<String>) -> Self {
        self.manifest = self.manifest.capability(name);
        self
    }

    /// Declare a dependency.
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.manifest = self.manifest.depends_on(name);
        self
    }

    /// Declare an event.
    #[must_use]
    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.manifest = self.manifest.event(name);
        self
    }

    /// Add a storage prefix.
    #[must_use]
    pub fn storage_path(mut self, prefix: impl Into<String>) -> Self {
        self.manifest = self.manifest.storage_path(prefix);
        self
    }

    /// Replace the factory.
    #[must_use]
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(FactoryContext) -> ModuleResult<ModuleApi> + Send + Sync + 'static,
    {
        self.factory = Arc::new(factory);
        self
    }

    /// Do not generate passthrough adapters.
    #[must_use]
    pub fn without_adapters(mut self) -> Self {
        self.auto_adapters = false;
        self
    }

    /// Use `adapter` for `capability`, declared or not.
    #[must_use]
    pub fn adapter(mut self, capability: impl Into<String>, adapter: CapabilityAdapter) -> Self {
        self.adapters.push((capability.into(), adapter));
        self
    }

    /// The module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the module source: `modules/<name>/module.rs`.
    #[must_use]
    pub fn module_path(&self) -> PathBuf {
        PathBuf::from(FIXTURE_ROOT)
            .join(&self.name)
            .join("module.rs")
    }

    /// Path of an adapter source: `modules/<name>/adapters/<kebab-case>.rs`.
    #[must_use]
    pub fn adapter_path(&self, capability: &str) -> PathBuf {
        PathBuf::from(FIXTURE_ROOT)
            .join(&self.name)
            .join("adapters")
            .join(format!("{}.rs", to_kebab(capability)))
    }

    /// Build the definition.
    ///
    /// # Panics
    ///
    /// Panics if the manifest is invalid.
    #[must_use]
    pub fn definition(&self) -> ModuleDefinition {
        let factory = Arc::clone(&self.factory);
        ModuleDefinition::new(self.manifest.clone(), move |ctx| factory(ctx))
            .unwrap_or_else(|e| panic!("invalid fixture manifest for '{}': {e}", self.name))
    }

    /// Append the module source and its adapter sources to `sources`.
    #[must_use]
    pub fn add_to(self, sources: SourceSet) -> SourceSet {
        let mut sources = sources.module(self.module_path(), self.definition());

        let mut adapters: Vec<(String, CapabilityAdapter)> = Vec::new();
        if self.auto_adapters {
            for capability in &self.manifest.required_capabilities {
                if !self.adapters.iter().any(|(name, _)| name == capability) {
                    adapters.push((capability.clone(), CapabilityAdapter::passthrough()));
                }
            }
        }
        adapters.extend(self.adapters.iter().cloned());

        for (capability, adapter) in adapters {
            sources = sources.adapter(self.adapter_path(&capability), adapter);
        }
        sources
    }
}

/// Build a source set from fixtures, in order.
#[must_use]
pub fn sources(fixtures: impl IntoIterator<Item = ModuleFixture>) -> SourceSet {
    fixtures
        .into_iter()
        .fold(SourceSet::new(), |sources, fixture| fixture.add_to(sources))
}

/// A definition with the given manifest whose factory returns an empty API.
///
/// # Panics
///
/// Panics if the manifest is invalid.
#[must_use]
pub fn empty_definition(manifest: ModuleManifest) -> ModuleDefinition {
    ModuleDefinition::new(manifest, |_| Ok(ModuleApi::new()))
        .unwrap_or_else(|e| panic!("invalid fixture manifest: {e}"))
}

/// `jsonFile` to `json-file`.
fn to_kebab(identifier: &str) -> String {
    let mut kebab = String::with_capacity(identifier.len());
    for c in identifier.chars() {
        if c.is_ascii_uppercase() {
            kebab.push('-');
            kebab.push(c.to_ascii_lowercase());
        } else {
            kebab.push(c);
        }
    }
    kebab
}
