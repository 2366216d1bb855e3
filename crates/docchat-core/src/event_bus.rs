//! Framework-agnostic event broadcasting.
//!
//! The EventBus distributes [`ConversationEvent`]s from the store to any
//! number of displays (the terminal client, tests, a future web surface).
//!
//! # Example
//!
//! ```rust
//! use docchat_core::conversation::ConversationEvent;
//! use docchat_core::event_bus::EventBus;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.emit(ConversationEvent::SelectionChanged { index: Some(0) });
//!
//! // let event = rx.recv().await.unwrap();
//! # let _ = rx.try_recv();
//! ```

use tokio::sync::broadcast;

use crate::conversation::ConversationEvent;

/// Default channel capacity for the event bus.
/// Slow subscribers that fall further behind than this miss events (lag).
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcasts conversation events to every subscriber.
pub struct EventBus {
    sender: broadcast::Sender<ConversationEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event.
    ///
    /// Returns the number of subscribers that received it; with no
    /// subscribers the event is dropped and 0 is returned.
    pub fn emit(&self, event: ConversationEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Receive all future events. Past events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
