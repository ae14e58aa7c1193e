//! Event types for the Trellis event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Correlation ID for tracing related events.
    pub correlation_id: Option<Uuid>,
    /// Source component that generated the event.
    pub source: String,
}

impl EventMetadata {
    /// Create new event metadata.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: None,
            source: source.into(),
        }
    }

    /// Set correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// All events that travel on the Trellis event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrellisEvent {
    /// A module broadcast one of its declared events.
    ModuleEmitted {
        /// Event metadata.
        metadata: EventMetadata,
        /// Emitting module.
        module: String,
        /// Declared event name.
        event: String,
        /// Event payload, passed through untouched.
        payload: Value,
    },

    /// A module factory returned and its API was published.
    ModuleInstantiated {
        /// Event metadata.
        metadata: EventMetadata,
        /// Module name.
        module: String,
        /// Operation names exposed by the published API.
        operations: Vec<String>,
    },

    /// Every module was instantiated.
    BootCompleted {
        /// Event metadata.
        metadata: EventMetadata,
        /// Module names in instantiation order.
        order: Vec<String>,
    },

    /// Boot aborted.
    BootFailed {
        /// Event metadata.
        metadata: EventMetadata,
        /// Boot stage that failed.
        stage: String,
        /// Rendered error.
        reason: String,
    },
}

impl TrellisEvent {
    /// Get the event metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::ModuleEmitted { metadata, .. }
            | Self::ModuleInstantiated { metadata, .. }
            | Self::BootCompleted { metadata, .. }
            | Self::BootFailed { metadata, .. } => metadata,
        }
    }

    /// Get the event type as a string.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ModuleEmitted { .. } => "module_emitted",
            Self::ModuleInstantiated { .. } => "module_instantiated",
            Self::BootCompleted { .. } => "boot_completed",
            Self::BootFailed { .. } => "boot_failed",
        }
    }

    /// The `(module, event)` channel for module emissions.
    ///
    /// Lifecycle events have no channel.
    #[must_use]
    pub fn channel(&self) -> Option<(&str, &str)> {
        match self {
            Self::ModuleEmitted { module, event, .. } => Some((module.as_str(), event.as_str())),
            _ => None,
        }
    }
}
