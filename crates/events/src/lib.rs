//! Herald notification engine.
//!
//! Turns business events into per-user notifications:
//!
//! - [`EventIntake`] persists an event and announces it on the [`EventBus`].
//! - [`EventProcessor`] matches rules, renders templates, resolves
//!   recipients, applies rate limits and hands the results to the
//!   [`DeliveryOrchestrator`].
//! - [`delivery`] holds the channel transports (email, push, SMS, chat).
//! - [`scheduler`] runs the periodic detectors, dispatchers and cleanup.
//! - [`store`] abstracts storage; Postgres in production, in-memory in tests.
//!
//! [`Engine`] wires all of it from a set of stores and an [`EngineConfig`].

pub mod broadcast;
pub mod bus;
pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod intake;
pub mod matcher;
pub mod processor;
pub mod rate_limit;
pub mod recipients;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod targets;

#[cfg(test)]
mod test_support;

pub use broadcast::BroadcastService;
pub use bus::{EventBus, EventNotice};
pub use config::{ConfigError, EngineConfig};
pub use delivery::{DeliveryOrchestrator, Transports};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use intake::{EventIntake, Submission};
pub use processor::{EventProcessor, ProcessReport};
pub use scheduler::Scheduler;
pub use status::EngineStatus;
pub use store::{MemoryStore, PgStore, StoreError, Stores};
