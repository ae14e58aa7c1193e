//! Capability adapters.
//!
//! An adapter narrows a raw capability into the sub-API one module actually
//! uses (for example a JSON store reduced to "load/save thread"). Each module
//! owns one adapter per declared capability; governance rejects any mismatch.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::capability::{Capability, CapabilityError};

type Transform = Arc<dyn Fn(Capability) -> Result<Capability, CapabilityError> + Send + Sync>;

/// Transforms a raw capability into a module-specific one.
#[derive(Clone)]
pub struct CapabilityAdapter {
    transform: Transform,
}

impl CapabilityAdapter {
    /// Create an adapter from an untyped transform.
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(Capability) -> Result<Capability, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            transform: Arc::new(transform),
        }
    }

    /// Hand the raw capability through unchanged.
    #[must_use]
    pub fn passthrough() -> Self {
        Self::new(Ok)
    }

    /// Create an adapter from a typed transform.
    ///
    /// The raw capability is downcast to `R` first; a capability of any other
    /// type fails with [`CapabilityError::TypeMismatch`].
    pub fn map<R, A, F>(transform: F) -> Self
    where
        R: Any + Send + Sync,
        A: Any + Send + Sync,
        F: Fn(Arc<R>) -> Result<A, CapabilityError> + Send + Sync + 'static,
    {
        Self::new(move |raw: Capability| {
            let raw = raw
                .downcast::<R>()
                .map_err(|_| CapabilityError::TypeMismatch {
                    expected: std::any::type_name::<R>(),
                })?;
            let adapted = transform(raw)?;
            Ok(Arc::new(adapted) as Capability)
        })
    }

    /// Apply the transform.
    ///
    /// # Errors
    ///
    /// Returns whatever the transform returns.
    pub fn apply(&self, raw: Capability) -> Result<Capability, CapabilityError> {
        (self.transform)(raw)
    }
}

impl fmt::Debug for CapabilityAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityAdapter").finish_non_exhaustive()
    }
}

/// One module's adapters, keyed by capability name.
#[derive(Debug, Clone, Default)]
pub struct AdapterSet {
    adapters: BTreeMap<String, CapabilityAdapter>,
}

impl AdapterSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, capability: impl Into<String>, adapter: CapabilityAdapter) -> Self {
        self.insert(capability, adapter);
        self
    }

    /// Add an adapter, returning the one it replaced.
    pub fn insert(
        &mut self,
        capability: impl Into<String>,
        adapter: CapabilityAdapter,
    ) -> Option<CapabilityAdapter> {
        self.adapters.insert(capability.into(), adapter)
    }

    /// The adapter for `capability`, if any.
    #[must_use]
    pub fn get(&self, capability: &str) -> Option<&CapabilityAdapter> {
        self.adapters.get(capability)
    }

    /// Whether an adapter exists for `capability`.
    #[must_use]
    pub fn contains(&self, capability: &str) -> bool {
        self.adapters.contains_key(capability)
    }

    /// Adapted capability names, sorted.
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    /// Number of adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::capability;

    struct Store {
        prefix: String,
    }

    struct ThreadStore {
        location: String,
    }

    #[test]
    fn test_passthrough_keeps_identity() {
        let raw = capability(Store {
            prefix: "threads".into(),
        });
        let adapted = CapabilityAdapter::passthrough()
            .apply(Arc::clone(&raw))
            .unwrap();
        assert!(Arc::ptr_eq(&raw, &adapted));
    }

    #[test]
    fn test_map_narrows_capability() {
        let adapter = CapabilityAdapter::map(|store: Arc<Store>| {
            Ok(ThreadStore {
                location: format!("{}/threads.json", store.prefix),
            })
        });

        let adapted = adapter
            .apply(capability(Store {
                prefix: "data".into(),
            }))
            .unwrap();
        let thread_store = adapted.downcast::<ThreadStore>().ok().unwrap();
        assert_eq!(thread_store.location, "data/threads.json");
    }

    #[test]
    fn test_map_rejects_wrong_type() {
        let adapter = CapabilityAdapter::map(|store: Arc<Store>| Ok(store.prefix.clone()));
        let err = adapter.apply(capability(42_u32)).unwrap_err();
        assert!(matches!(err, CapabilityError::TypeMismatch { .. }));
    }

    #[test]
    fn test_adapter_failure_propagates() {
        let adapter = CapabilityAdapter::new(|_| Err(CapabilityError::failed("no quota")));
        let err = adapter.apply(capability(())).unwrap_err();
        assert_eq!(err.to_string(), "no quota");
    }

    #[test]
    fn test_set_sorted_names() {
        let set = AdapterSet::new()
            .with("logger", CapabilityAdapter::passthrough())
            .with("http", CapabilityAdapter::passthrough());

        assert_eq!(set.capabilities().collect::<Vec<_>>(), vec!["http", "logger"]);
        assert!(set.contains("http"));
        assert!(set.get("jsonFile").is_none());
        assert_eq!(set.len(), 2);
    }
}
