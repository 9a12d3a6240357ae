//! Event processor: match, render, resolve, rate-limit, deliver.
//!
//! [`EventProcessor::run`] listens for [`EventNotice`](crate::bus::EventNotice)s
//! and processes each event on its own task, bounded by a semaphore. Events
//! whose notice was missed (startup, lag) are picked up by a periodic sweep
//! of unprocessed rows.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use herald_core::event::Event;
use herald_core::notification::NewNotification;
use herald_core::rate_limit::Admission;
use herald_core::rules::NotificationRule;
use herald_core::template::{recipient_roles, render, NotificationContent};
use herald_core::types::DbId;
use serde::Serialize;
use tokio::sync::{broadcast, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::config::EngineConfig;
use crate::delivery::DeliveryOrchestrator;
use crate::error::{EngineError, EngineResult};
use crate::matcher::RuleMatcher;
use crate::rate_limit::RateLimiter;
use crate::recipients::RecipientResolver;
use crate::status::EngineStatus;
use crate::store::{EventStore, NotificationStore, RuleStore, Stores};

/// How often unprocessed events are swept while running.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of processing one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub event_id: DbId,
    /// The event was already processed; nothing was done.
    pub skipped: bool,
    pub matched_rules: usize,
    pub created: usize,
    pub throttled: usize,
    pub duplicates: usize,
    /// Notifications left `pending` by an earlier attempt and delivered now.
    pub redelivered: usize,
    pub delivered: usize,
}

pub struct EventProcessor {
    events: Arc<dyn EventStore>,
    rules: Arc<dyn RuleStore>,
    notifications: Arc<dyn NotificationStore>,
    matcher: RuleMatcher,
    resolver: RecipientResolver,
    limiter: RateLimiter,
    orchestrator: DeliveryOrchestrator,
    bus: Arc<EventBus>,
    status: Arc<EngineStatus>,
    workers: usize,
    notice_poll: Duration,
    sweep_batch_size: i64,
    in_flight: Arc<Mutex<HashSet<DbId>>>,
}

impl EventProcessor {
    pub fn new(
        stores: &Stores,
        orchestrator: DeliveryOrchestrator,
        bus: Arc<EventBus>,
        status: Arc<EngineStatus>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            events: Arc::clone(&stores.events),
            rules: Arc::clone(&stores.rules),
            notifications: Arc::clone(&stores.notifications),
            matcher: RuleMatcher::new(Arc::clone(&stores.rules)),
            resolver: RecipientResolver::new(Arc::clone(&stores.users)),
            limiter: RateLimiter::new(Arc::clone(&stores.notifications)),
            orchestrator,
            bus,
            status,
            workers: config.event_workers.max(1),
            notice_poll: config.notice_poll,
            sweep_batch_size: config.sweep_batch_size,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Process one event end to end.
    ///
    /// Safe to call more than once for the same event: an already-processed
    /// event is skipped, and a re-run after a partial failure only creates
    /// the notifications that are still missing. Each rule's notifications
    /// are delivered as soon as they are admitted, and a failing rule does
    /// not stop the others. `processed_at` is set only when every rule
    /// succeeded, so any error leaves the event for the next sweep.
    pub async fn process_event(&self, event_id: DbId) -> EngineResult<ProcessReport> {
        let event = self
            .events
            .get(event_id)
            .await?
            .ok_or(EngineError::EventNotFound(event_id))?;
        let mut report = ProcessReport {
            event_id,
            ..Default::default()
        };
        if event.is_processed() {
            report.skipped = true;
            return Ok(report);
        }

        let matched = self.matcher.match_event(&event).await?;
        report.matched_rules = matched.len();

        let mut first_error = None;
        for rule in &matched {
            if let Err(e) = self.fire(rule, &event, &mut report).await {
                tracing::warn!(event_id, rule_id = rule.id, error = %e, "Rule failed, event left for retry");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        self.events.mark_processed(event_id, Utc::now()).await?;

        tracing::info!(
            event_id,
            event_type = %event.event_type,
            matched_rules = report.matched_rules,
            created = report.created,
            throttled = report.throttled,
            redelivered = report.redelivered,
            delivered = report.delivered,
            "Event processed"
        );
        Ok(report)
    }

    /// Apply one matched rule: render, resolve recipients, admit a
    /// notification per recipient and deliver what was admitted.
    ///
    /// Notifications admitted before an error are still delivered. When a
    /// recipient already has a notification for this `(event, rule)` that
    /// never left `pending`, it is delivered now.
    async fn fire(&self, rule: &NotificationRule, event: &Event, report: &mut ProcessReport) -> EngineResult<()> {
        let rendered = render(&rule.template, event);
        if !rendered.is_clean() {
            tracing::warn!(
                event_id = event.id,
                rule_id = rule.id,
                failed_fields = rendered.failures.len(),
                "Template rendered with literal fallbacks"
            );
            for failure in &rendered.failures {
                tracing::debug!(
                    event_id = event.id,
                    rule_id = rule.id,
                    field = %failure.field,
                    error = %failure.error,
                    "Template field left unrendered"
                );
            }
        }
        let content = NotificationContent::from_rendered(&rendered.fields, event);
        let recipients = self
            .resolver
            .resolve(recipient_roles(&rule.template), event)
            .await?;
        if recipients.is_empty() {
            tracing::debug!(event_id = event.id, rule_id = rule.id, "Rule matched but has no recipients");
        }

        let now = Utc::now();
        let mut created = Vec::new();
        let mut duplicates = 0;
        let mut outcome: EngineResult<()> = Ok(());
        for user_id in recipients {
            let new = NewNotification::for_rule(event, rule.id, user_id, content.clone());
            match self.limiter.admit(new, rule, now).await {
                Ok(Admission::Created(notification)) => created.push(notification),
                Ok(Admission::Throttled(_)) => report.throttled += 1,
                Ok(Admission::Duplicate) => duplicates += 1,
                Err(e) => {
                    outcome = Err(e.into());
                    break;
                }
            }
        }
        report.duplicates += duplicates;

        let mut outstanding = Vec::new();
        if duplicates > 0 {
            match self.notifications.pending_for_rule(event.id, rule.id).await {
                Ok(pending) => {
                    outstanding = pending
                        .into_iter()
                        .filter(|p| created.iter().all(|c| c.id != p.id))
                        .collect();
                }
                Err(e) => {
                    if outcome.is_ok() {
                        outcome = Err(e.into());
                    }
                }
            }
        }
        if !outstanding.is_empty() {
            tracing::info!(
                event_id = event.id,
                rule_id = rule.id,
                count = outstanding.len(),
                "Delivering notifications left pending by an earlier attempt"
            );
            report.redelivered += outstanding.len();
        }

        report.created += created.len();
        let triggered = !created.is_empty();
        outstanding.extend(created);
        if !outstanding.is_empty() {
            let bulk = self.orchestrator.deliver_bulk(&outstanding, false).await;
            report.delivered += bulk.delivered_users;
        }

        if triggered {
            self.rules.mark_triggered(rule.id, now).await?;
        }
        outcome
    }

    /// Run until `cancel` fires, then wait for in-flight events to finish.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut receiver = self.bus.subscribe();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        // The first tick fires immediately, which doubles as the startup sweep.
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);

        self.status.set_processor_running(true);
        tracing::info!(workers = self.workers, "Event processor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event processor stopping");
                    break;
                }
                _ = sweep.tick() => self.sweep(&semaphore).await,
                received = tokio::time::timeout(self.notice_poll, receiver.recv()) => match received {
                    Err(_) => continue,
                    Ok(Ok(notice)) => self.dispatch(notice.event_id, &semaphore).await,
                    Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                        tracing::warn!(skipped = n, "Event processor lagged, sweeping unprocessed events");
                        self.sweep(&semaphore).await;
                    }
                    Ok(Err(broadcast::error::RecvError::Closed)) => {
                        tracing::info!("Event bus closed, processor shutting down");
                        break;
                    }
                },
            }
        }

        let all = u32::try_from(self.workers).unwrap_or(u32::MAX);
        if semaphore.acquire_many(all).await.is_err() {
            tracing::warn!("Event processor semaphore closed before drain");
        }
        self.status.set_processor_running(false);
        tracing::info!("Event processor stopped");
    }

    async fn sweep(self: &Arc<Self>, semaphore: &Arc<Semaphore>) {
        match self.events.list_unprocessed(self.sweep_batch_size).await {
            Ok(events) => {
                if !events.is_empty() {
                    tracing::info!(count = events.len(), "Sweeping unprocessed events");
                }
                for event in events {
                    self.dispatch(event.id, semaphore).await;
                }
            }
            Err(e) => tracing::error!(error = %e, "Unprocessed event sweep failed"),
        }
    }

    /// Spawn processing of `event_id` unless it is already in flight.
    async fn dispatch(self: &Arc<Self>, event_id: DbId, semaphore: &Arc<Semaphore>) {
        let Some(guard) = InFlight::claim(&self.in_flight, event_id) else {
            tracing::debug!(event_id, "Event already in flight, notice dropped");
            return;
        };
        let Ok(permit) = Arc::clone(semaphore).acquire_owned().await else {
            return;
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            if let Err(e) = this.process_event(event_id).await {
                tracing::error!(event_id, error = %e, "Event processing failed, will retry on sweep");
            }
        });
    }
}

/// Membership in the in-flight set, released on drop.
struct InFlight {
    set: Arc<Mutex<HashSet<DbId>>>,
    event_id: DbId,
}

impl InFlight {
    fn claim(set: &Arc<Mutex<HashSet<DbId>>>, event_id: DbId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(event_id);
        inserted.then(|| Self {
            set: Arc::clone(set),
            event_id,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.event_id);
    }
}
