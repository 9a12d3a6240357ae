//! In-process notice bus backed by a `tokio::sync::broadcast` channel.
//!
//! Producers insert the event row first and then publish an
//! [`EventNotice`] carrying only its id; the processor loads the row
//! itself. A notice is a wake-up, not the source of truth, so a lost notice
//! is recovered by the processor's sweep of unprocessed events.

use herald_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// "An event with this id is ready."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNotice {
    pub event_id: DbId,
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus for [`EventNotice`]s, shared as `Arc<EventBus>`.
pub struct EventBus {
    sender: broadcast::Sender<EventNotice>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest notices are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notice to all current subscribers.
    ///
    /// Returns the number of subscribers that will see it; zero is not an
    /// error because the event row is already durable.
    pub fn publish(&self, notice: EventNotice) -> usize {
        self.sender.send(notice).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventNotice> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
