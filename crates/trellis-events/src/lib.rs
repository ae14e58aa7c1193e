//! Trellis Events - Event bus for the Trellis module runtime.
//!
//! This crate provides:
//! - Event types for module emissions and boot lifecycle transitions
//! - A broadcast-based event bus for async subscribers
//! - Receivers filtered by `(module, event)` channel
//!
//! # Architecture
//!
//! Modules never talk to the bus directly. The composition engine hands each
//! module a scoped emitter that checks the module's declared event names and
//! then publishes a [`TrellisEvent::ModuleEmitted`] here. External listeners
//! subscribe either to everything or to one `(module, event)` channel.
//!
//! # Example
//!
//! ```rust
//! use trellis_events::{EventBus, EventMetadata, TrellisEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe_channel("threads", "thread-created");
//!
//! bus.publish(TrellisEvent::ModuleEmitted {
//!     metadata: EventMetadata::new("threads"),
//!     module: "threads".to_string(),
//!     event: "thread-created".to_string(),
//!     payload: serde_json::json!({ "id": 7 }),
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "module_emitted");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bus;
mod event;

pub use bus::{ChannelFilter, DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, TrellisEvent};
