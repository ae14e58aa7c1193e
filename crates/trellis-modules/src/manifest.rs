//! Module manifest types.
//!
//! A manifest is the declarative half of a module: the capabilities it needs,
//! the modules it builds on, the events it may broadcast and the storage
//! prefixes its path-scoped capabilities are bound to. Manifests can be built
//! in code or parsed from TOML:
//!
//! ```toml
//! required_capabilities = ["jsonFile", "logger"]
//! required_modules = ["personas"]
//! declared_events = ["thread-created", "thread-deleted"]
//! storage_paths = ["threads"]
//! ```

use std::collections::HashSet;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, ModuleResult};

/// The declarative part of a module descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Capability names, in injection order.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// Module names that must be instantiated first.
    #[serde(default)]
    pub required_modules: Vec<String>,
    /// Event names the module may emit.
    #[serde(default)]
    pub declared_events: Vec<String>,
    /// Relative storage prefixes handed to path-scoped capability factories.
    #[serde(default)]
    pub storage_paths: Vec<String>,
}

impl ModuleManifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a manifest from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidManifest`] if the TOML is malformed or
    /// the manifest fails [`validate`](Self::validate).
    pub fn from_toml_str(content: &str) -> ModuleResult<Self> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| ModuleError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Add a required capability.
    #[must_use]
    pub fn capability(mut self, name: impl Into<String>) -> Self {
        self.required_capabilities.push(name.into());
        self
    }

    /// Add a required module.
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.required_modules.push(name.into());
        self
    }

    /// Add a declared event.
    #[must_use]
    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.declared_events.push(name.into());
        self
    }

    /// Add a storage prefix.
    #[must_use]
    pub fn storage_path(mut self, prefix: impl Into<String>) -> Self {
        self.storage_paths.push(prefix.into());
        self
    }

    /// Check the manifest's structural rules.
    ///
    /// Capability, module and event lists are sets: entries must be non-empty
    /// and unique. Storage prefixes must be relative and must not climb out
    /// of the data root.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidManifest`] describing the first violation.
    pub fn validate(&self) -> ModuleResult<()> {
        check_set("required_capabilities", &self.required_capabilities)?;
        check_set("required_modules", &self.required_modules)?;
        check_set("declared_events", &self.declared_events)?;
        for prefix in &self.storage_paths {
            check_storage_prefix(prefix)?;
        }
        Ok(())
    }
}

fn check_set(field: &str, entries: &[String]) -> ModuleResult<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.trim().is_empty() {
            return Err(ModuleError::InvalidManifest(format!(
                "{field} contains an empty entry"
            )));
        }
        if !seen.insert(entry.as_str()) {
            return Err(ModuleError::InvalidManifest(format!(
                "{field} lists '{entry}' more than once"
            )));
        }
    }
    Ok(())
}

fn check_storage_prefix(prefix: &str) -> ModuleResult<()> {
    if prefix.is_empty() {
        return Err(ModuleError::InvalidManifest(
            "storage_paths contains an empty prefix".into(),
        ));
    }
    for component in Path::new(prefix).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {},
            Component::ParentDir => {
                return Err(ModuleError::InvalidManifest(format!(
                    "storage path '{prefix}' must not contain '..'"
                )));
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(ModuleError::InvalidManifest(format!(
                    "storage path '{prefix}' must be relative"
                )));
            },
        }
    }
    Ok(())
}
