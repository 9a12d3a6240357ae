//! Row structs for every table the engine reads or writes.
//!
//! Rows derive `FromRow`; domain types live in `herald-core` and are built
//! from rows with `From` / `into_*` conversions defined next to each row.

pub mod announcement;
pub mod broadcast;
pub mod delivery;
pub mod event;
pub mod inventory;
pub mod invoice;
pub mod notification;
pub mod preference;
pub mod rule;
pub mod scheduled_notification;
pub mod user;

use herald_core::types::DbId;
use serde_json::Value;

/// String entries of a JSONB array column. Anything else yields an empty list.
pub fn json_string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Integer entries of a JSONB array column.
pub fn json_id_list(value: &Value) -> Vec<DbId> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}
