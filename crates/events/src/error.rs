//! Engine error type.

use herald_core::error::CoreError;
use herald_core::types::DbId;

use crate::store::StoreError;

/// Errors surfaced by engine operations.
///
/// Store failures are transient: the caller logs them and the unit of work
/// is retried on the next notice, sweep or tick.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("Event {0} not found")]
    EventNotFound(DbId),

    #[error("Broadcast {0} not found")]
    BroadcastNotFound(DbId),

    #[error("Broadcast {0} is resolved")]
    BroadcastResolved(DbId),
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::Store(StoreError::Database(e))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
