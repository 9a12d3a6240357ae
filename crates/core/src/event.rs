//! The business event envelope consumed by the rule matching engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How urgent an event (and the notifications it produces) is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable fact asserted by a producer module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: DbId,
    /// Producer tag, e.g. `"inventory"`.
    pub source_module: String,
    /// Dot-namespaced type, e.g. `"stock.low"`.
    pub event_type: String,
    pub severity: Severity,
    pub occurred_at: Timestamp,
    /// Structured, producer-defined data. Always a JSON object.
    pub payload: Value,
    pub branch_id: Option<DbId>,
    pub user_id: Option<DbId>,
    pub idempotency_key: Option<String>,
    /// Set once, after every matching rule has been evaluated.
    pub processed_at: Option<Timestamp>,
}

impl Event {
    /// Top-level attribute names visible to conditions and templates.
    pub const ATTRIBUTES: [&'static str; 8] = [
        "id",
        "source_module",
        "event_type",
        "severity",
        "occurred_at",
        "branch_id",
        "user_id",
        "processed_at",
    ];

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Value of a declared top-level attribute.
    ///
    /// Returns `None` for unknown names and for optional attributes that are
    /// unset, so an absent attribute is indistinguishable from a missing one.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id)),
            "source_module" => Some(Value::from(self.source_module.as_str())),
            "event_type" => Some(Value::from(self.event_type.as_str())),
            "severity" => Some(Value::from(self.severity.as_str())),
            "occurred_at" => Some(Value::from(self.occurred_at.to_rfc3339())),
            "branch_id" => self.branch_id.map(Value::from),
            "user_id" => self.user_id.map(Value::from),
            "processed_at" => self.processed_at.map(|t| Value::from(t.to_rfc3339())),
            "payload" => Some(self.payload.clone()),
            _ => None,
        }
    }

    /// Resolve a dot-path against the event.
    ///
    /// The first segment is looked up among the top-level attributes
    /// (including `payload` itself); if it is not one, the whole path is
    /// resolved inside `payload`. Returns `None` when any segment is absent.
    pub fn resolve_path(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        if head.is_empty() {
            return None;
        }

        if head == "payload" {
            return match rest {
                Some(rest) => lookup_path(&self.payload, rest).cloned(),
                None => Some(self.payload.clone()),
            };
        }

        if let Some(value) = self.attribute(head) {
            return match rest {
                Some(rest) => lookup_path(&value, rest).cloned(),
                None => Some(value),
            };
        }

        lookup_path(&self.payload, path).cloned()
    }

    /// Flat rendering context: declared attributes first, then every payload
    /// key on top. Payload keys shadow same-named attributes.
    pub fn context(&self) -> Map<String, Value> {
        let mut context = Map::new();
        for name in Self::ATTRIBUTES {
            if let Some(value) = self.attribute(name) {
                context.insert(name.to_string(), value);
            }
        }
        if let Value::Object(payload) = &self.payload {
            for (key, value) in payload {
                context.insert(key.clone(), value.clone());
            }
        }
        context
    }
}

// ---------------------------------------------------------------------------
// NewEvent
// ---------------------------------------------------------------------------

/// Insert payload for an event, as submitted by a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub source_module: String,
    pub event_type: String,
    #[serde(default)]
    pub severity: Severity,
    /// Defaults to the insert time when omitted.
    #[serde(default)]
    pub occurred_at: Option<Timestamp>,
    #[serde(default = "empty_object")]
    pub payload: Value,
    #[serde(default)]
    pub branch_id: Option<DbId>,
    #[serde(default)]
    pub user_id: Option<DbId>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl NewEvent {
    pub fn new(source_module: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            source_module: source_module.into(),
            event_type: event_type.into(),
            severity: Severity::Info,
            occurred_at: None,
            payload: empty_object(),
            branch_id: None,
            user_id: None,
            idempotency_key: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_branch(mut self, branch_id: Option<DbId>) -> Self {
        self.branch_id = branch_id;
        self
    }

    pub fn with_user(mut self, user_id: Option<DbId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Reject envelopes the engine cannot route.
    ///
    /// The module must be non-empty, the type a dot-separated list of
    /// non-empty segments, and the payload a JSON object.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_module.trim().is_empty() {
            return Err(CoreError::Validation("source_module must not be empty".into()));
        }
        if self.event_type.is_empty() || self.event_type.split('.').any(str::is_empty) {
            return Err(CoreError::Validation(format!(
                "event_type {:?} must be dot-separated non-empty segments",
                self.event_type
            )));
        }
        if !self.payload.is_object() {
            return Err(CoreError::Validation("payload must be a JSON object".into()));
        }
        if matches!(&self.idempotency_key, Some(k) if k.trim().is_empty()) {
            return Err(CoreError::Validation("idempotency_key must not be blank".into()));
        }
        Ok(())
    }

    /// Materialise as an unprocessed event. Used by in-memory stores.
    pub fn into_event(self, id: DbId, now: Timestamp) -> Event {
        Event {
            id,
            source_module: self.source_module,
            event_type: self.event_type,
            severity: self.severity,
            occurred_at: self.occurred_at.unwrap_or(now),
            payload: self.payload,
            branch_id: self.branch_id,
            user_id: self.user_id,
            idempotency_key: self.idempotency_key,
            processed_at: None,
        }
    }
}

/// Walk a dot-separated path through nested objects and arrays.
///
/// Numeric segments index into arrays. An empty segment never matches.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    /// The inventory event used across the core tests.
    pub fn stock_low_event() -> Event {
        Event {
            id: 7,
            source_module: "inventory".to_string(),
            event_type: "stock.low".to_string(),
            severity: Severity::Warning,
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            payload: json!({
                "product_id": 42,
                "product_name": "Widget",
                "current_stock": 3,
                "min_quantity": 10,
                "tags": ["fragile", "bulk"],
                "warehouse": {"code": "WH-1", "bins": ["A1", "A2"]}
            }),
            branch_id: Some(2),
            user_id: None,
            idempotency_key: None,
            processed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::test_support::stock_low_event;
    use super::*;

    #[test]
    fn resolve_top_level_attribute() {
        let event = stock_low_event();
        assert_eq!(event.resolve_path("source_module"), Some(json!("inventory")));
        assert_eq!(event.resolve_path("severity"), Some(json!("warning")));
        assert_eq!(event.resolve_path("branch_id"), Some(json!(2)));
    }

    #[test]
    fn unset_optional_attribute_is_absent() {
        let event = stock_low_event();
        assert_eq!(event.resolve_path("user_id"), None);
    }

    #[test]
    fn resolve_explicit_payload_prefix() {
        let event = stock_low_event();
        assert_eq!(event.resolve_path("payload.current_stock"), Some(json!(3)));
        assert_eq!(event.resolve_path("payload.warehouse.code"), Some(json!("WH-1")));
    }

    #[test]
    fn resolve_falls_back_to_payload() {
        let event = stock_low_event();
        assert_eq!(event.resolve_path("product_id"), Some(json!(42)));
        assert_eq!(event.resolve_path("warehouse.bins.1"), Some(json!("A2")));
    }

    #[test]
    fn resolve_missing_path_is_none() {
        let event = stock_low_event();
        assert_eq!(event.resolve_path("payload.nope"), None);
        assert_eq!(event.resolve_path("warehouse.bins.9"), None);
        assert_eq!(event.resolve_path(""), None);
        assert_eq!(event.resolve_path("payload..x"), None);
    }

    #[test]
    fn context_payload_shadows_attributes() {
        let mut event = stock_low_event();
        event.payload["severity"] = json!("payload-wins");
        let context = event.context();
        assert_eq!(context["severity"], "payload-wins");
        assert_eq!(context["event_type"], "stock.low");
        assert_eq!(context["product_id"], 42);
        assert!(!context.contains_key("user_id"));
    }

    #[test]
    fn severity_parse_round_trip() {
        for s in [Severity::Info, Severity::Warning, Severity::Critical] {
            assert_eq!(Severity::parse(s.as_str()), Some(s));
        }
        assert_eq!(Severity::parse("fatal"), None);
    }

    #[test]
    fn new_event_validation() {
        assert!(NewEvent::new("inventory", "stock.low").validate().is_ok());
        assert!(NewEvent::new("", "stock.low").validate().is_err());
        assert!(NewEvent::new("inventory", "stock..low").validate().is_err());
        assert!(NewEvent::new("inventory", "stock.low")
            .with_payload(json!([1, 2]))
            .validate()
            .is_err());
    }

    #[test]
    fn new_event_deserializes_with_defaults() {
        let new: NewEvent =
            serde_json::from_value(json!({"source_module": "crm", "event_type": "lead.created"}))
                .unwrap();
        assert_eq!(new.severity, Severity::Info);
        assert!(new.payload.is_object());
        assert!(new.occurred_at.is_none());
    }
}
