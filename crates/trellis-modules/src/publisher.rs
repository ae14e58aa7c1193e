//! Publication seam for instantiated module APIs.
//!
//! The engine hands every freshly built API to an [`ApiPublisher`] before
//! storing it. Mapping operations onto a transport is the publisher's
//! business; the engine defines no protocol.

use std::sync::Arc;

use thiserror::Error;

use crate::api::ModuleApi;
use crate::descriptor::ModuleName;

/// A publisher rejected a module API.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PublishError(String);

impl PublishError {
    /// Create a publish error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Receives each module API as soon as it is built.
pub trait ApiPublisher: Send + Sync {
    /// Expose `api` for `module`.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] if the API cannot be exposed; boot aborts.
    fn publish(&self, module: &ModuleName, api: Arc<ModuleApi>) -> Result<(), PublishError>;
}

/// Publisher that accepts everything and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl ApiPublisher for NoopPublisher {
    fn publish(&self, _module: &ModuleName, _api: Arc<ModuleApi>) -> Result<(), PublishError> {
        Ok(())
    }
}
