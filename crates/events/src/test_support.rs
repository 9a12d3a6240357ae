//! Fixtures shared by the engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use herald_core::channels::Channel;
use herald_core::event::{Event, Severity};
use herald_core::notification::Notification;
use herald_core::recipient::Recipient;
use herald_core::rules::NotificationRule;
use herald_core::types::DbId;
use serde_json::{Map, Value};

use crate::delivery::{ChannelTransport, DeliveryError, DeliveryResult};

/// An unprocessed inventory event with no branch or actor.
pub fn event(event_type: &str, payload: Value) -> Event {
    Event {
        id: 1,
        source_module: "inventory".to_string(),
        event_type: event_type.to_string(),
        severity: Severity::Warning,
        occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        payload,
        branch_id: None,
        user_id: None,
        idempotency_key: None,
        processed_at: None,
    }
}

/// An active, unthrottled rule with an empty template.
pub fn rule(id: DbId, pattern: &str) -> NotificationRule {
    NotificationRule {
        id,
        name: format!("rule {id}"),
        is_active: true,
        priority: 0,
        source_module: None,
        event_type_pattern: pattern.to_string(),
        condition: None,
        template: Map::new(),
        cooldown_minutes: None,
        max_per_hour: None,
        last_triggered_at: None,
    }
}

/// A rule template from a JSON object literal.
pub fn template(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail,
    Hang,
    Panic,
}

/// Transport that behaves as told and counts its calls.
pub struct FakeTransport {
    channel: Channel,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new(channel: Channel, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            channel,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelTransport for FakeTransport {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, _recipient: &Recipient, _notification: &Notification) -> DeliveryResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(DeliveryError::HttpStatus(503)),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            Behavior::Panic => panic!("transport exploded"),
        }
    }
}
