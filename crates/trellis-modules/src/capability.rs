//! Capability contract: the fixed kind table, the capability source and the
//! guarded bundle handed to module factories.
//!
//! Capabilities are type-erased shared services. The engine never looks
//! inside one; it only decides which module receives which capability and
//! under which storage prefixes.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::descriptor::ModuleName;
use crate::error::{ModuleError, ModuleResult};

/// A type-erased shared service.
pub type Capability = Arc<dyn Any + Send + Sync>;

/// Builds a path-scoped capability from the data root and a module's storage prefixes.
pub type PathScopedFactory =
    Arc<dyn Fn(&Path, &[String]) -> Result<Capability, CapabilityError> + Send + Sync>;

/// Wrap a concrete service as a [`Capability`].
pub fn capability<T: Any + Send + Sync>(value: T) -> Capability {
    Arc::new(value)
}

/// Errors raised by capability sources, factories and adapters.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// A value was registered in the wrong kind of slot.
    #[error("capability '{capability}' must be registered as {expected}")]
    SlotMismatch {
        /// The capability kind.
        capability: CapabilityKind,
        /// What the slot accepts.
        expected: &'static str,
    },

    /// A storage prefix is absolute or escapes the data root.
    #[error("invalid storage path '{0}'")]
    InvalidStoragePath(String),

    /// A capability was not the type an adapter expected.
    #[error("capability is not a {expected}")]
    TypeMismatch {
        /// The expected type name.
        expected: &'static str,
    },

    /// A factory or adapter failed for its own reasons.
    #[error("{0}")]
    Failed(String),
}

impl CapabilityError {
    /// Build a [`CapabilityError::Failed`] from any displayable error.
    pub fn failed(message: impl fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}

/// The closed table of capability kinds a module may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    /// Key-value JSON document storage.
    JsonFile,
    /// Append-only log storage.
    AppendLog,
    /// Archive extraction.
    Archive,
    /// Path globbing.
    Glob,
    /// Logging sink.
    Logger,
    /// HTTP client.
    Http,
}

impl CapabilityKind {
    /// Every kind, in table order.
    pub const ALL: [Self; 6] = [
        Self::JsonFile,
        Self::AppendLog,
        Self::Archive,
        Self::Glob,
        Self::Logger,
        Self::Http,
    ];

    /// The name modules use to require this kind.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::JsonFile => "jsonFile",
            Self::AppendLog => "appendLog",
            Self::Archive => "archive",
            Self::Glob => "glob",
            Self::Logger => "logger",
            Self::Http => "http",
        }
    }

    /// Look a kind up by its name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether instances are built per module from its storage prefixes.
    #[must_use]
    pub fn is_path_scoped(self) -> bool {
        matches!(self, Self::JsonFile | Self::AppendLog)
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a capability source holds for one kind.
#[derive(Clone)]
pub(crate) enum CapabilitySlot {
    Shared(Capability),
    PathScoped(PathScopedFactory),
}

/// Supplies capabilities by kind: a shared instance for plain kinds, a
/// factory for path-scoped kinds.
#[derive(Clone, Default)]
pub struct CapabilitySource {
    slots: HashMap<CapabilityKind, CapabilitySlot>,
}

impl CapabilitySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the shared instance for a non-path-scoped kind.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::SlotMismatch`] if `kind` is path-scoped.
    pub fn register_shared(
        &mut self,
        kind: CapabilityKind,
        instance: Capability,
    ) -> Result<&mut Self, CapabilityError> {
        if kind.is_path_scoped() {
            return Err(CapabilityError::SlotMismatch {
                capability: kind,
                expected: "a path-scoped factory",
            });
        }
        self.slots.insert(kind, CapabilitySlot::Shared(instance));
        Ok(self)
    }

    /// Register the factory for a path-scoped kind.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::SlotMismatch`] if `kind` is not path-scoped.
    pub fn register_path_scoped<F>(
        &mut self,
        kind: CapabilityKind,
        factory: F,
    ) -> Result<&mut Self, CapabilityError>
    where
        F: Fn(&Path, &[String]) -> Result<Capability, CapabilityError> + Send + Sync + 'static,
    {
        if !kind.is_path_scoped() {
            return Err(CapabilityError::SlotMismatch {
                capability: kind,
                expected: "a shared instance",
            });
        }
        self.slots
            .insert(kind, CapabilitySlot::PathScoped(Arc::new(factory)));
        Ok(self)
    }

    /// Whether the source supplies `kind`.
    #[must_use]
    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Supplied kinds, in table order.
    #[must_use]
    pub fn kinds(&self) -> Vec<CapabilityKind> {
        CapabilityKind::ALL
            .into_iter()
            .filter(|kind| self.slots.contains_key(kind))
            .collect()
    }

    pub(crate) fn slot(&self, kind: CapabilityKind) -> Option<&CapabilitySlot> {
        self.slots.get(&kind)
    }
}

impl fmt::Debug for CapabilitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySource")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Join each storage prefix onto `data_root`, rejecting absolute or
/// escaping prefixes.
///
/// Path-scoped factories use this to turn a module's prefixes into the
/// directories they may touch.
///
/// # Errors
///
/// Returns [`CapabilityError::InvalidStoragePath`] for the first bad prefix.
pub fn resolve_storage_paths(
    data_root: &Path,
    prefixes: &[String],
) -> Result<Vec<PathBuf>, CapabilityError> {
    prefixes
        .iter()
        .map(|prefix| {
            let relative = Path::new(prefix);
            let escapes = prefix.is_empty()
                || relative.components().any(|component| {
                    matches!(
                        component,
                        Component::ParentDir | Component::RootDir | Component::Prefix(_)
                    )
                });
            if escapes {
                return Err(CapabilityError::InvalidStoragePath(prefix.clone()));
            }
            Ok(data_root.join(relative))
        })
        .collect()
}

/// The capabilities resolved for one module.
///
/// Reads go through [`get`](Self::get), which fails for any name the module
/// did not declare instead of handing back nothing.
#[derive(Clone)]
pub struct CapabilityBundle {
    module: ModuleName,
    entries: Vec<(String, Capability)>,
}

impl CapabilityBundle {
    pub(crate) fn new(module: ModuleName) -> Self {
        Self {
            module,
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, capability: Capability) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            entry.1 = capability;
        } else {
            self.entries.push((name, capability));
        }
    }

    /// The module the bundle belongs to.
    #[must_use]
    pub fn module(&self) -> &ModuleName {
        &self.module
    }

    /// Read a capability as its concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::UndeclaredCapabilityAccess`] if the module did
    /// not declare `name`, or [`ModuleError::CapabilityTypeMismatch`] if the
    /// capability is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> ModuleResult<Arc<T>> {
        self.get_raw(name)?
            .downcast::<T>()
            .map_err(|_| ModuleError::CapabilityTypeMismatch {
                module: self.module.to_string(),
                capability: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Read a capability without downcasting.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::UndeclaredCapabilityAccess`] if the module did
    /// not declare `name`.
    pub fn get_raw(&self, name: &str) -> ModuleResult<Capability> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, capability)| Arc::clone(capability))
            .ok_or_else(|| ModuleError::UndeclaredCapabilityAccess {
                module: self.module.to_string(),
                capability: name.to_string(),
            })
    }

    /// Whether `name` is in the bundle.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    /// Capability names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CapabilityBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityBundle")
            .field("module", &self.module)
            .field("capabilities", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
