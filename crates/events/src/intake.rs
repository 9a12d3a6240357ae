//! Event intake: persist an event, then announce it on the bus.

use std::sync::Arc;

use herald_core::event::{Event, NewEvent};

use crate::bus::{EventBus, EventNotice};
use crate::error::EngineResult;
use crate::store::EventStore;

/// What happened to a submitted event.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Accepted(Event),
    /// An event with the same idempotency key already exists; nothing was
    /// published.
    Duplicate,
}

/// The producer-facing entry point shared by the HTTP intake and the
/// scheduler's detectors.
#[derive(Clone)]
pub struct EventIntake {
    events: Arc<dyn EventStore>,
    bus: Arc<EventBus>,
}

impl EventIntake {
    pub fn new(events: Arc<dyn EventStore>, bus: Arc<EventBus>) -> Self {
        Self { events, bus }
    }

    /// Validate, insert and publish a notice for `new`.
    ///
    /// The row is durable before the notice goes out, so a notice nobody
    /// receives is recovered by the processor's sweep.
    pub async fn submit(&self, new: NewEvent) -> EngineResult<Submission> {
        new.validate()?;

        let key = new.idempotency_key.clone();
        match self.events.insert(new).await? {
            Some(event) => {
                let receivers = self.bus.publish(EventNotice { event_id: event.id });
                tracing::debug!(
                    event_id = event.id,
                    event_type = %event.event_type,
                    receivers,
                    "Event accepted"
                );
                Ok(Submission::Accepted(event))
            }
            None => {
                tracing::debug!(idempotency_key = ?key, "Duplicate event ignored");
                Ok(Submission::Duplicate)
            }
        }
    }
}
