//! Pure domain logic for the Herald notification core.
//!
//! Nothing in this crate performs I/O. The engine crate (`herald-events`)
//! loads data through its stores and hands it to the functions here:
//!
//! - [`rules`] - event-type patterns, the condition DSL and rule matching.
//! - [`template`] - `{{ variable }}` rendering of notification templates.
//! - [`recipient`] - audience selection for a rule firing.
//! - [`rate_limit`] - cooldown / hourly-cap policy.
//! - [`preferences`] and [`delivery`] - channel gating, quiet hours and
//!   per-channel result aggregation.
//! - [`recurrence`] and [`detectors`] - scheduler arithmetic.

pub mod channels;
pub mod delivery;
pub mod detectors;
pub mod error;
pub mod event;
pub mod notification;
pub mod preferences;
pub mod rate_limit;
pub mod recipient;
pub mod recurrence;
pub mod rules;
pub mod template;
pub mod types;
