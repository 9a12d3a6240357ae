//! Notification rules and the pure rule-matching pass.
//!
//! A rule passes an event when, in order and short-circuiting:
//!
//! 1. its `source_module` filter (if any) equals the event's module,
//! 2. its [`EventTypePattern`] matches the event type,
//! 3. its [`Condition`] (if any) holds for the event.

pub mod condition;
pub mod pattern;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::Event;
use crate::rate_limit::RateLimitPolicy;
use crate::types::{DbId, Timestamp};

pub use condition::{Condition, Operator};
pub use pattern::EventTypePattern;

/// A rule that cannot be evaluated against an event.
///
/// Rules that raise one of these are treated as not matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("invalid event type pattern {0:?}")]
    InvalidPattern(String),

    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    #[error("unknown condition operator {0:?}")]
    UnknownOperator(String),
}

/// A standing subscription matching events to notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: DbId,
    pub name: String,
    pub is_active: bool,
    /// Higher fires first; ties broken by ascending id.
    pub priority: i32,
    /// Exact-match module filter. `None` accepts any module.
    pub source_module: Option<String>,
    pub event_type_pattern: String,
    /// Raw stored condition, parsed with [`Condition::from_value`].
    pub condition: Option<Value>,
    /// Field name → template string or literal. Includes `recipient_roles`.
    pub template: Map<String, Value>,
    pub cooldown_minutes: Option<i32>,
    pub max_per_hour: Option<i32>,
    pub last_triggered_at: Option<Timestamp>,
}

impl NotificationRule {
    pub fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.cooldown_minutes, self.max_per_hour)
    }

    /// Evaluate the three filters against `event`.
    pub fn matches(&self, event: &Event) -> Result<bool, MatchError> {
        if let Some(module) = &self.source_module {
            if module != &event.source_module {
                return Ok(false);
            }
        }

        if !EventTypePattern::parse(&self.event_type_pattern)?.matches(&event.event_type) {
            return Ok(false);
        }

        match &self.condition {
            Some(dsl) if !dsl.is_null() => Ok(Condition::from_value(dsl)?.evaluate(event)),
            _ => Ok(true),
        }
    }
}

/// Result of matching a rule set against one event.
#[derive(Debug, Default)]
pub struct MatchOutcome<'a> {
    /// Passing rules, highest priority first.
    pub matched: Vec<&'a NotificationRule>,
    /// Rules that could not be evaluated, with the reason.
    pub errors: Vec<(DbId, MatchError)>,
}

/// Order rules by `priority desc, id asc`.
pub fn priority_order(a: &NotificationRule, b: &NotificationRule) -> std::cmp::Ordering {
    b.priority.cmp(&a.priority).then(a.id.cmp(&b.id))
}

/// Match every active rule in `rules` against `event`.
///
/// Inactive rules are ignored. The input order does not matter; the
/// result is always in priority order.
pub fn match_rules<'a>(rules: &'a [NotificationRule], event: &Event) -> MatchOutcome<'a> {
    let mut candidates: Vec<&NotificationRule> = rules.iter().filter(|r| r.is_active).collect();
    candidates.sort_by(|a, b| priority_order(a, b));

    let mut outcome = MatchOutcome::default();
    for rule in candidates {
        match rule.matches(event) {
            Ok(true) => outcome.matched.push(rule),
            Ok(false) => {}
            Err(e) => outcome.errors.push((rule.id, e)),
        }
    }
    outcome
}
