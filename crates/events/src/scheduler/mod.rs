//! Supervised periodic jobs.
//!
//! Each [`PeriodicJob`] gets its own task and timer. Every tick runs the job
//! in a freshly spawned task, so a panic or error in one run is logged and
//! the job simply waits for its next tick. Jobs never share a timer, and a
//! failing job cannot stall the others.

pub mod announcements;
pub mod broadcast_watchdog;
pub mod low_stock;
pub mod overdue_invoices;
pub mod retention;
pub mod scheduled_notifications;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use herald_core::types::Timestamp;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::EngineResult;
use crate::status::EngineStatus;

pub use announcements::AnnouncementPublisher;
pub use broadcast_watchdog::BroadcastWatchdog;
pub use low_stock::LowStockDetector;
pub use overdue_invoices::OverdueInvoiceDetector;
pub use retention::RetentionCleanup;
pub use scheduled_notifications::ScheduledNotificationDispatcher;

/// When a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Immediately on start, then this long after each run finishes.
    Every(Duration),
    /// Once a day at this UTC wall-clock time.
    DailyAt(NaiveTime),
}

impl Schedule {
    /// Delay before the first run.
    pub fn initial_delay(&self, now: Timestamp) -> Duration {
        match self {
            Schedule::Every(_) => Duration::ZERO,
            Schedule::DailyAt(_) => self.delay_after(now),
        }
    }

    /// Delay from `now` until the next run.
    pub fn delay_after(&self, now: Timestamp) -> Duration {
        match *self {
            Schedule::Every(period) => period,
            Schedule::DailyAt(at) => {
                let today = now.date_naive().and_time(at).and_utc();
                let next = if today > now {
                    today
                } else {
                    today + chrono::Duration::days(1)
                };
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

/// A unit of background work.
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    fn schedule(&self) -> Schedule;

    /// Do one pass. Returns how many items were handled.
    ///
    /// Must be idempotent: a pass that fails halfway is simply repeated on
    /// the next tick.
    async fn run_once(&self) -> EngineResult<usize>;
}

/// Owns the job tasks and their shared cancellation token.
pub struct Scheduler {
    jobs: Vec<Arc<dyn PeriodicJob>>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    status: Arc<EngineStatus>,
}

impl Scheduler {
    pub fn new(status: Arc<EngineStatus>) -> Self {
        Self {
            jobs: Vec::new(),
            cancel: CancellationToken::new(),
            handles: Vec::new(),
            status,
        }
    }

    pub fn with_job(mut self, job: Arc<dyn PeriodicJob>) -> Self {
        self.jobs.push(job);
        self
    }

    /// Spawn one supervised task per registered job.
    pub fn start(&mut self) {
        for job in &self.jobs {
            tracing::info!(job = job.name(), schedule = ?job.schedule(), "Starting background job");
            self.handles
                .push(tokio::spawn(supervise(Arc::clone(job), self.cancel.clone())));
        }
        self.status.set_scheduler_running(true);
    }

    /// Cancel every job and wait up to `timeout` for in-progress runs.
    pub async fn stop(self, timeout: Duration) {
        self.cancel.cancel();
        let all = futures::future::join_all(self.handles);
        if tokio::time::timeout(timeout, all).await.is_err() {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Background jobs did not stop in time"
            );
        }
        self.status.set_scheduler_running(false);
        tracing::info!("Scheduler stopped");
    }
}

async fn supervise(job: Arc<dyn PeriodicJob>, cancel: CancellationToken) {
    let schedule = job.schedule();
    let mut delay = schedule.initial_delay(Utc::now());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job = job.name(), "Background job stopping");
                break;
            }
            _ = tokio::time::sleep(delay) => {
                run_tick(&job).await;
                delay = schedule.delay_after(Utc::now());
            }
        }
    }
}

/// Run one pass in its own task so a panic stays contained.
async fn run_tick(job: &Arc<dyn PeriodicJob>) {
    let name = job.name();
    let runner = Arc::clone(job);
    match tokio::spawn(async move { runner.run_once().await }).await {
        Ok(Ok(0)) => tracing::debug!(job = name, "Background job: nothing to do"),
        Ok(Ok(handled)) => tracing::info!(job = name, handled, "Background job completed"),
        Ok(Err(e)) => tracing::error!(job = name, error = %e, "Background job failed"),
        Err(e) if e.is_panic() => tracing::error!(job = name, "Background job panicked"),
        Err(e) => tracing::error!(job = name, error = %e, "Background job cancelled"),
    }
}
