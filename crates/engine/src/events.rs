//! Lifecycle events
//!
//! The mapper publishes one event per completed save, remove and index
//! write, and one per failure that has no caller to report to (a
//! fire-and-forget index write). Publishing never blocks; without
//! subscribers events are dropped.

use serde::{Deserialize, Serialize};
use settee_core::Lifecycle;
use tokio::sync::broadcast;

/// Events buffered per subscriber before it starts lagging
pub const EVENT_CAPACITY: usize = 256;

/// A lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum MapperEvent {
    /// Document written
    Save {
        /// Model name
        model: String,
        /// Full store key
        key: String,
    },
    /// Document removed
    Remove {
        /// Model name
        model: String,
        /// Full store key
        key: String,
    },
    /// Lookup documents written
    Index {
        /// Model name
        model: String,
        /// Full store key of the owning document
        key: String,
        /// Operations applied
        operations: usize,
    },
    /// Failure not returned to any caller
    Error {
        /// Model name
        model: String,
        /// Full store key
        key: String,
        /// Operation that failed
        lifecycle: Lifecycle,
        /// Error text
        message: String,
    },
}

/// Broadcast channel of mapper events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MapperEvent>,
}

impl EventBus {
    /// Bus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    /// Publish an event
    pub fn emit(&self, event: MapperEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    /// New receiver for events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MapperEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(EVENT_CAPACITY)
    }
}
