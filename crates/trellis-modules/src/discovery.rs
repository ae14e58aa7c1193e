//! Module and adapter discovery from an injected source set.
//!
//! Sources are identified by path convention:
//!
//! - a module source lives at `<...>/<module>/module[.<ext>]`; the containing
//!   directory names the module.
//! - an adapter source lives at `<...>/<module>/adapters/<capability>[.<ext>]`;
//!   the directory above `adapters` names the owning module and the file stem,
//!   converted to an identifier (`json-file` becomes `jsonFile`), names the
//!   capability.
//!
//! A source without an export, or whose path does not follow the convention,
//! is logged and skipped. Governance is the fatal gate, not discovery.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::adapter::{AdapterSet, CapabilityAdapter};
use crate::descriptor::{ModuleDefinition, ModuleName};
use crate::error::{ModuleError, ModuleResult};

/// File stem of a module source.
pub const MODULE_ITEM: &str = "module";

/// Directory holding a module's adapter sources.
pub const ADAPTERS_DIR: &str = "adapters";

/// A module source: a path plus the definition it exports, if any.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    /// Where the source lives.
    pub path: PathBuf,
    /// The exported definition.
    pub export: Option<ModuleDefinition>,
}

impl ModuleSource {
    /// A source exporting `definition`.
    pub fn new(path: impl Into<PathBuf>, definition: ModuleDefinition) -> Self {
        Self {
            path: path.into(),
            export: Some(definition),
        }
    }

    /// A source that exports nothing.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            export: None,
        }
    }
}

/// An adapter source: a path plus the adapter it exports, if any.
#[derive(Debug, Clone)]
pub struct AdapterSource {
    /// Where the source lives.
    pub path: PathBuf,
    /// The exported adapter.
    pub export: Option<CapabilityAdapter>,
}

impl AdapterSource {
    /// A source exporting `adapter`.
    pub fn new(path: impl Into<PathBuf>, adapter: CapabilityAdapter) -> Self {
        Self {
            path: path.into(),
            export: Some(adapter),
        }
    }

    /// A source that exports nothing.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            export: None,
        }
    }
}

/// Every source discovery will scan.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    modules: Vec<ModuleSource>,
    adapters: Vec<AdapterSource>,
}

impl SourceSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module source exporting `definition`.
    #[must_use]
    pub fn module(mut self, path: impl Into<PathBuf>, definition: ModuleDefinition) -> Self {
        self.modules.push(ModuleSource::new(path, definition));
        self
    }

    /// Add an adapter source exporting `adapter`.
    #[must_use]
    pub fn adapter(mut self, path: impl Into<PathBuf>, adapter: CapabilityAdapter) -> Self {
        self.adapters.push(AdapterSource::new(path, adapter));
        self
    }

    /// Add a prepared module source.
    pub fn push_module(&mut self, source: ModuleSource) {
        self.modules.push(source);
    }

    /// Add a prepared adapter source.
    pub fn push_adapter(&mut self, source: AdapterSource) {
        self.adapters.push(source);
    }

    /// Module sources, in insertion order.
    #[must_use]
    pub fn modules(&self) -> &[ModuleSource] {
        &self.modules
    }

    /// Adapter sources, in insertion order.
    #[must_use]
    pub fn adapters(&self) -> &[AdapterSource] {
        &self.adapters
    }

    /// Whether the set holds no sources at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.adapters.is_empty()
    }
}

/// A module found by discovery, with its adapters attached.
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    /// Name taken from the source's container.
    pub name: ModuleName,
    /// The exported definition.
    pub definition: ModuleDefinition,
    /// Adapters found under the module's `adapters` directory.
    pub adapters: AdapterSet,
    /// Path of the module source.
    pub source: PathBuf,
}

/// Scan `sources` and group adapters under their modules.
///
/// Modules come back in source order.
///
/// # Errors
///
/// Returns [`ModuleError::DuplicateModule`] if two module sources yield the
/// same name, or [`ModuleError::DuplicateAdapter`] if two adapter sources
/// yield the same module and capability.
pub fn discover(sources: SourceSet) -> ModuleResult<Vec<DiscoveredModule>> {
    let SourceSet { modules, adapters } = sources;

    let mut discovered: Vec<DiscoveredModule> = Vec::with_capacity(modules.len());
    let mut by_name: HashMap<ModuleName, usize> = HashMap::new();

    for source in modules {
        let Some(definition) = source.export else {
            warn!(path = %source.path.display(), "Module source has no export, skipping");
            continue;
        };
        let Some(name) = module_name_from_path(&source.path) else {
            warn!(
                path = %source.path.display(),
                "Module source does not follow <module>/{MODULE_ITEM} layout, skipping"
            );
            continue;
        };
        let name = match ModuleName::new(name) {
            Ok(name) => name,
            Err(e) => {
                warn!(path = %source.path.display(), error = %e, "Invalid module name, skipping");
                continue;
            },
        };

        if let Some(&existing) = by_name.get(&name) {
            return Err(ModuleError::DuplicateModule {
                name: name.to_string(),
                first: discovered[existing].source.display().to_string(),
                second: source.path.display().to_string(),
            });
        }

        debug!(module = %name, path = %source.path.display(), "Discovered module");
        by_name.insert(name.clone(), discovered.len());
        discovered.push(DiscoveredModule {
            name,
            definition,
            adapters: AdapterSet::new(),
            source: source.path,
        });
    }

    let mut adapter_paths: HashMap<(String, String), PathBuf> = HashMap::new();
    for source in adapters {
        let Some(adapter) = source.export else {
            warn!(path = %source.path.display(), "Adapter source has no export, skipping");
            continue;
        };
        let Some((module, capability)) = adapter_key_from_path(&source.path) else {
            warn!(
                path = %source.path.display(),
                layout = %format!("<module>/{ADAPTERS_DIR}/<capability>"),
                "Adapter source does not follow the adapter layout, skipping"
            );
            continue;
        };
        let Some(&owner) = by_name.get(module.as_str()) else {
            warn!(
                path = %source.path.display(),
                module = %module,
                "Adapter source names an undiscovered module, skipping"
            );
            continue;
        };

        let key = (module, capability);
        if let Some(first) = adapter_paths.get(&key) {
            return Err(ModuleError::DuplicateAdapter {
                module: key.0,
                capability: key.1,
                first: first.display().to_string(),
                second: source.path.display().to_string(),
            });
        }

        debug!(
            module = %key.0,
            capability = %key.1,
            path = %source.path.display(),
            "Discovered adapter"
        );
        discovered[owner].adapters.insert(key.1.clone(), adapter);
        adapter_paths.insert(key, source.path);
    }

    info!(
        modules = discovered.len(),
        adapters = adapter_paths.len(),
        "Discovery complete"
    );
    Ok(discovered)
}

/// The module name a module source path yields, if it follows the layout.
#[must_use]
pub fn module_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem != MODULE_ITEM {
        return None;
    }
    let container = path.parent()?.file_name()?.to_str()?;
    Some(container.to_string())
}

/// The `(module, capability)` an adapter source path yields, if it follows
/// the layout.
#[must_use]
pub fn adapter_key_from_path(path: &Path) -> Option<(String, String)> {
    let stem = path.file_stem()?.to_str()?;
    let adapters_dir = path.parent()?;
    if adapters_dir.file_name()?.to_str()? != ADAPTERS_DIR {
        return None;
    }
    let module = adapters_dir.parent()?.file_name()?.to_str()?;
    let capability = to_identifier(stem);
    if capability.is_empty() {
        return None;
    }
    Some((module.to_string(), capability))
}

/// Convert a `-` or `_` delimited name to an identifier:
/// `json-file` and `json_file` both become `jsonFile`.
#[must_use]
pub fn to_identifier(name: &str) -> String {
    let mut segments = name.split(['-', '_']).filter(|s| !s.is_empty());
    let mut identifier = segments.next().map(str::to_string).unwrap_or_default();
    for segment in segments {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            identifier.extend(first.to_uppercase());
            identifier.push_str(chars.as_str());
        }
    }
    identifier
}
