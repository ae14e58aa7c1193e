//! In-memory capabilities and a recording publisher.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use trellis_modules::{
    ApiPublisher, Capability, CapabilityError, CapabilityKind, CapabilitySource, ModuleApi,
    ModuleName, PublishError, capability, resolve_storage_paths,
};

/// In-memory stand-in for the `jsonFile` capability.
///
/// Remembers the directories it was scoped to so tests can check what a
/// module's storage prefixes resolved to.
#[derive(Debug, Default)]
pub struct MemoryJsonStore {
    roots: Vec<PathBuf>,
    documents: Mutex<BTreeMap<String, Value>>,
}

impl MemoryJsonStore {
    /// Create a store scoped to `roots`.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            documents: Mutex::new(BTreeMap::new()),
        }
    }

    /// Directories this store was scoped to.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Read a document.
    #[must_use]
    pub fn load(&self, key: &str) -> Option<Value> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(key).cloned())
    }

    /// Write a document, replacing any previous value.
    pub fn save(&self, key: impl Into<String>, value: Value) {
        if let Ok(mut docs) = self.documents.lock() {
            docs.insert(key.into(), value);
        }
    }

    /// Stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.documents
            .lock()
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// In-memory stand-in for the `appendLog` capability.
#[derive(Debug, Default)]
pub struct MemoryAppendLog {
    roots: Vec<PathBuf>,
    entries: Mutex<Vec<Value>>,
}

impl MemoryAppendLog {
    /// Create a log scoped to `roots`.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Directories this log was scoped to.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Append an entry.
    pub fn append(&self, entry: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Every entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Value> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

/// Captures lines written through the `logger` capability.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    /// Record a line.
    pub fn log(&self, line: impl Into<String>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.into());
        }
    }

    /// Recorded lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

/// Opaque placeholder for the `archive`, `glob` and `http` capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeService(pub CapabilityKind);

fn json_store_factory(root: &Path, prefixes: &[String]) -> Result<Capability, CapabilityError> {
    Ok(capability(MemoryJsonStore::new(resolve_storage_paths(
        root, prefixes,
    )?)))
}

fn append_log_factory(root: &Path, prefixes: &[String]) -> Result<Capability, CapabilityError> {
    Ok(capability(MemoryAppendLog::new(resolve_storage_paths(
        root, prefixes,
    )?)))
}

/// A capability source supplying every kind in the capability table.
///
/// `jsonFile` and `appendLog` build fresh in-memory stores per module,
/// `logger` is one shared [`MemoryLogger`], and the remaining kinds are
/// [`FakeService`] placeholders.
#[must_use]
pub fn fake_capabilities() -> CapabilitySource {
    fake_capabilities_with_logger(Arc::new(MemoryLogger::default()))
}

/// Like [`fake_capabilities`], sharing `logger` so the test can inspect it.
///
/// # Panics
///
/// Panics if a fake capability cannot be registered.
#[must_use]
pub fn fake_capabilities_with_logger(logger: Arc<MemoryLogger>) -> CapabilitySource {
    let mut source = CapabilitySource::new();
    for kind in CapabilityKind::ALL {
        let registered = match kind {
            CapabilityKind::JsonFile => source.register_path_scoped(kind, json_store_factory),
            CapabilityKind::AppendLog => source.register_path_scoped(kind, append_log_factory),
            CapabilityKind::Logger => {
                source.register_shared(kind, Arc::clone(&logger) as Capability)
            },
            CapabilityKind::Archive | CapabilityKind::Glob | CapabilityKind::Http => {
                source.register_shared(kind, capability(FakeService(kind)))
            },
        };
        if let Err(e) = registered {
            panic!("failed to register fake capability '{kind}': {e}");
        }
    }
    source
}

/// Records every API handed to it, optionally refusing one module.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<String>)>>,
    reject: Option<String>,
}

impl RecordingPublisher {
    /// Create a publisher that accepts every module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a publisher that refuses `module`.
    #[must_use]
    pub fn rejecting(module: impl Into<String>) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            reject: Some(module.into()),
        }
    }

    /// Published module names, in publication order.
    #[must_use]
    pub fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .map(|published| published.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Operation names published for `module`.
    #[must_use]
    pub fn operations(&self, module: &str) -> Option<Vec<String>> {
        self.published.lock().ok().and_then(|published| {
            published
                .iter()
                .find(|(name, _)| name == module)
                .map(|(_, operations)| operations.clone())
        })
    }
}

impl ApiPublisher for RecordingPublisher {
    fn publish(&self, module: &ModuleName, api: Arc<ModuleApi>) -> Result<(), PublishError> {
        if self.reject.as_deref() == Some(module.as_str()) {
            return Err(PublishError::new(format!("publisher refused '{module}'")));
        }
        let mut published = self
            .published
            .lock()
            .map_err(|_| PublishError::new("publisher lock poisoned"))?;
        published.push((module.to_string(), api.operation_names()));
        Ok(())
    }
}
