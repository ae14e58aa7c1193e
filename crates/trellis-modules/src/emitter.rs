//! Per-module event emission restricted to declared event names.

use serde_json::Value;
use tracing::debug;
use trellis_events::{EventBus, EventMetadata, TrellisEvent};

use crate::descriptor::ModuleName;
use crate::error::{ModuleError, ModuleResult};

/// A module's handle on the event bus.
///
/// Only names listed in the module's `declared_events` can be emitted;
/// anything else fails before touching the bus.
#[derive(Debug, Clone)]
pub struct ScopedEmitter {
    module: ModuleName,
    allowed: Vec<String>,
    bus: EventBus,
}

impl ScopedEmitter {
    /// Create an emitter for `module` over `bus`.
    #[must_use]
    pub fn new(module: ModuleName, declared_events: &[String], bus: EventBus) -> Self {
        Self {
            module,
            allowed: declared_events.to_vec(),
            bus,
        }
    }

    /// Broadcast `event` with `payload` on the `(module, event)` channel.
    ///
    /// Returns the number of receivers the event reached.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::UndeclaredEventEmission`] if `event` was not
    /// declared by the module.
    pub fn emit(&self, event: &str, payload: Value) -> ModuleResult<usize> {
        if !self.allowed.iter().any(|allowed| allowed == event) {
            return Err(ModuleError::UndeclaredEventEmission {
                module: self.module.to_string(),
                event: event.to_string(),
                allowed: self.allowed.clone(),
            });
        }

        let receivers = self.bus.publish(TrellisEvent::ModuleEmitted {
            metadata: EventMetadata::new(self.module.as_str()),
            module: self.module.to_string(),
            event: event.to_string(),
            payload,
        });
        debug!(module = %self.module, event, receivers, "Module event emitted");
        Ok(receivers)
    }

    /// The emitting module.
    #[must_use]
    pub fn module(&self) -> &ModuleName {
        &self.module
    }

    /// Declared event names.
    #[must_use]
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}
