//! Event bus for broadcasting events to subscribers.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::event::TrellisEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event bus for broadcasting events to all subscribers.
///
/// The event bus uses a broadcast channel to deliver events to all
/// connected receivers. Events are delivered asynchronously and in order.
/// Clones share the same underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    /// Sender for broadcasting events.
    sender: broadcast::Sender<Arc<TrellisEvent>>,
    /// Channel capacity.
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a `tokio::sync::broadcast` requirement).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    pub fn publish(&self, event: TrellisEvent) -> usize {
        let event = Arc::new(event);

        trace!(event_type = %event.event_type(), "Publishing event");

        if let Ok(count) = self.sender.send(Arc::clone(&event)) {
            debug!(
                event_type = %event.event_type(),
                receiver_count = count,
                "Event published"
            );
            count
        } else {
            // No receivers - this is fine
            trace!(event_type = %event.event_type(), "No receivers for event");
            0
        }
    }

    /// Subscribe to every event.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), ChannelFilter::Any)
    }

    /// Subscribe to every event emitted by one module.
    #[must_use]
    pub fn subscribe_module(&self, module: impl Into<String>) -> EventReceiver {
        EventReceiver::new(
            self.sender.subscribe(),
            ChannelFilter::Module(module.into()),
        )
    }

    /// Subscribe to a single `(module, event)` channel.
    #[must_use]
    pub fn subscribe_channel(
        &self,
        module: impl Into<String>,
        event: impl Into<String>,
    ) -> EventReceiver {
        EventReceiver::new(
            self.sender.subscribe(),
            ChannelFilter::Channel {
                module: module.into(),
                event: event.into(),
            },
        )
    }

    /// Get the current number of active receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Which events a receiver yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFilter {
    /// Every event, lifecycle included.
    Any,
    /// Module emissions from one module.
    Module(String),
    /// Module emissions on one `(module, event)` channel.
    Channel {
        /// Emitting module.
        module: String,
        /// Event name.
        event: String,
    },
}

impl ChannelFilter {
    fn matches(&self, event: &TrellisEvent) -> bool {
        match self {
            Self::Any => true,
            Self::Module(wanted) => event.channel().is_some_and(|(module, _)| module == wanted),
            Self::Channel {
                module: wanted_module,
                event: wanted_event,
            } => event
                .channel()
                .is_some_and(|(module, name)| module == wanted_module && name == wanted_event),
        }
    }
}

/// Receiver for events from the event bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<TrellisEvent>>,
    filter: ChannelFilter,
}

impl EventReceiver {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Arc<TrellisEvent>>,
        filter: ChannelFilter,
    ) -> Self {
        Self { receiver, filter }
    }

    /// The filter this receiver applies.
    #[must_use]
    pub fn filter(&self) -> &ChannelFilter {
        &self.filter
    }

    /// Receive the next matching event.
    ///
    /// Returns `None` once the channel is closed. Lagged events are
    /// logged and skipped.
    pub async fn recv(&mut self) -> Option<Arc<TrellisEvent>> {
        let mut skipped: usize = 0;
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                    skipped = skipped.wrapping_add(1);
                    if skipped.is_multiple_of(100) {
                        tokio::task::yield_now().await;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive the next matching event without blocking.
    ///
    /// Returns `None` if no matching event is buffered or the channel is closed.
    pub fn try_recv(&mut self) -> Option<Arc<TrellisEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventMetadata;
    use serde_json::json;

    fn emitted(module: &str, event: &str) -> TrellisEvent {
        TrellisEvent::ModuleEmitted {
            metadata: EventMetadata::new(module),
            module: module.to_string(),
            event: event.to_string(),
            payload: json!({ "module": module }),
        }
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        let count = bus.publish(emitted("threads", "thread-created"));
        assert_eq!(count, 1);

        let msg = receiver.recv().await.unwrap();
        assert_eq!(msg.channel(), Some(("threads", "thread-created")));
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(emitted("threads", "thread-created")), 0);
    }

    #[tokio::test]
    async fn test_channel_filter_skips_other_channels() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe_channel("threads", "thread-deleted");

        bus.publish(emitted("threads", "thread-created"));
        bus.publish(emitted("personas", "thread-deleted"));
        bus.publish(emitted("threads", "thread-deleted"));

        let msg = receiver.recv().await.unwrap();
        assert_eq!(msg.channel(), Some(("threads", "thread-deleted")));
        assert!(receiver.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_module_filter_ignores_lifecycle_events() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe_module("threads");

        bus.publish(TrellisEvent::BootCompleted {
            metadata: EventMetadata::new("kernel"),
            order: vec!["threads".to_string()],
        });
        bus.publish(emitted("threads", "thread-created"));

        let msg = receiver.try_recv().unwrap();
        assert_eq!(msg.event_type(), "module_emitted");
        assert!(receiver.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_cloned_bus_shares_channel() {
        let bus = EventBus::new();
        let cloned = bus.clone();
        let mut receiver = bus.subscribe();

        cloned.publish(emitted("a", "ping"));
        assert!(receiver.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        assert!(receiver.try_recv().is_none());
    }
}
