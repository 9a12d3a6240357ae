//! Loads active rules and runs the pure matching pass.

use std::sync::Arc;

use herald_core::event::Event;
use herald_core::rules::{match_rules, NotificationRule};

use crate::store::{RuleStore, StoreResult};

/// Rule matching engine over a [`RuleStore`].
#[derive(Clone)]
pub struct RuleMatcher {
    rules: Arc<dyn RuleStore>,
}

impl RuleMatcher {
    pub fn new(rules: Arc<dyn RuleStore>) -> Self {
        Self { rules }
    }

    /// Active rules that match `event`, highest priority first.
    ///
    /// A rule whose pattern or condition cannot be evaluated is logged and
    /// treated as not matching.
    pub async fn match_event(&self, event: &Event) -> StoreResult<Vec<NotificationRule>> {
        let active = self.rules.list_active().await?;
        let outcome = match_rules(&active, event);

        for (rule_id, error) in &outcome.errors {
            tracing::warn!(
                rule_id,
                event_id = event.id,
                error = %error,
                "Rule could not be evaluated, skipping"
            );
        }

        Ok(outcome.matched.into_iter().cloned().collect())
    }
}
