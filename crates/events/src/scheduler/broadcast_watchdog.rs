//! Emergency-broadcast acknowledgment watchdog.
//!
//! For active broadcasts with a resend policy whose interval has elapsed,
//! recounts the users who have not acknowledged and flags the broadcast for
//! resend while any remain. The resend itself is left to the operator.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use herald_db::repositories::BroadcastRepo;
use sqlx::PgPool;

use super::{PeriodicJob, Schedule};
use crate::error::EngineResult;

pub struct BroadcastWatchdog {
    pool: PgPool,
    interval: Duration,
}

impl BroadcastWatchdog {
    pub fn new(pool: PgPool, interval: Duration) -> Self {
        Self { pool, interval }
    }
}

#[async_trait]
impl PeriodicJob for BroadcastWatchdog {
    fn name(&self) -> &'static str {
        "broadcast_ack_watchdog"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.interval)
    }

    async fn run_once(&self) -> EngineResult<usize> {
        let checked = BroadcastRepo::flag_resends(&self.pool, Utc::now()).await?;
        let mut flagged = 0;
        for broadcast in checked.iter().filter(|b| b.flagged) {
            tracing::warn!(
                broadcast_id = broadcast.id,
                pending_acks = broadcast.pending_ack_count,
                resend_count = broadcast.resend_count,
                "Broadcast has unacknowledged recipients, flagged for resend"
            );
            flagged += 1;
        }
        Ok(flagged)
    }
}
