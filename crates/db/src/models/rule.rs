//! Notification rule entity model.

use herald_core::rules::NotificationRule;
use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_rules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RuleRow {
    pub id: DbId,
    pub name: String,
    pub is_active: bool,
    pub priority: i32,
    pub source_module: Option<String>,
    pub event_type_pattern: String,
    pub condition_dsl: Option<serde_json::Value>,
    pub notification_template: serde_json::Value,
    pub cooldown_minutes: Option<i32>,
    pub max_per_hour: Option<i32>,
    pub last_triggered_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<RuleRow> for NotificationRule {
    fn from(row: RuleRow) -> Self {
        let template = match row.notification_template {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        NotificationRule {
            id: row.id,
            name: row.name,
            is_active: row.is_active,
            priority: row.priority,
            source_module: row.source_module.filter(|m| !m.is_empty()),
            event_type_pattern: row.event_type_pattern,
            condition: row.condition_dsl,
            template,
            cooldown_minutes: row.cooldown_minutes,
            max_per_hour: row.max_per_hour,
            last_triggered_at: row.last_triggered_at,
        }
    }
}
