//! Wiring of the engine components.

use std::sync::Arc;

use sqlx::PgPool;

use crate::broadcast::BroadcastService;
use crate::bus::EventBus;
use crate::config::EngineConfig;
use crate::delivery::{DeliveryOrchestrator, Transports};
use crate::intake::EventIntake;
use crate::processor::EventProcessor;
use crate::scheduler::{
    AnnouncementPublisher, BroadcastWatchdog, LowStockDetector, OverdueInvoiceDetector,
    RetentionCleanup, ScheduledNotificationDispatcher, Scheduler,
};
use crate::status::EngineStatus;
use crate::store::Stores;

/// Every long-lived engine service, built once at startup and shared.
pub struct Engine {
    pub config: EngineConfig,
    pub stores: Stores,
    pub bus: Arc<EventBus>,
    pub status: Arc<EngineStatus>,
    pub intake: EventIntake,
    pub orchestrator: DeliveryOrchestrator,
    pub processor: Arc<EventProcessor>,
}

impl Engine {
    pub fn new(stores: Stores, transports: Transports, config: EngineConfig) -> Self {
        let bus = Arc::new(EventBus::default());
        let status = Arc::new(EngineStatus::new());
        let intake = EventIntake::new(Arc::clone(&stores.events), Arc::clone(&bus));
        let orchestrator = DeliveryOrchestrator::new(&stores, transports, &config);
        let processor = Arc::new(EventProcessor::new(
            &stores,
            orchestrator.clone(),
            Arc::clone(&bus),
            Arc::clone(&status),
            &config,
        ));
        Self {
            config,
            stores,
            bus,
            status,
            intake,
            orchestrator,
            processor,
        }
    }

    /// A scheduler with every background job registered. Not yet started.
    pub fn scheduler(&self, pool: &PgPool) -> Scheduler {
        let c = &self.config;
        Scheduler::new(Arc::clone(&self.status))
            .with_job(Arc::new(LowStockDetector::new(
                pool.clone(),
                self.intake.clone(),
                c.low_stock_interval,
            )))
            .with_job(Arc::new(OverdueInvoiceDetector::new(
                pool.clone(),
                self.intake.clone(),
                c.overdue_invoice_interval,
            )))
            .with_job(Arc::new(ScheduledNotificationDispatcher::new(
                pool.clone(),
                self.orchestrator.clone(),
                c.scheduled_dispatch_interval,
            )))
            .with_job(Arc::new(AnnouncementPublisher::new(
                pool.clone(),
                self.orchestrator.clone(),
                c.announcement_interval,
            )))
            .with_job(Arc::new(BroadcastWatchdog::new(
                pool.clone(),
                c.broadcast_watchdog_interval,
            )))
            .with_job(Arc::new(RetentionCleanup::new(
                pool.clone(),
                c.retention_days,
                c.retention_cleanup_at,
            )))
    }

    pub fn broadcasts(&self, pool: &PgPool) -> BroadcastService {
        BroadcastService::new(pool.clone(), self.orchestrator.clone())
    }
}

#[cfg(test)]
mod tests {
    use herald_core::event::NewEvent;
    use herald_core::recipient::Recipient;
    use herald_core::rules::NotificationRule;
    use serde_json::json;

    use super::*;
    use crate::intake::Submission;
    use crate::store::MemoryStore;
    use crate::test_support::{rule, template};

    #[tokio::test]
    async fn submitted_event_flows_through_processor() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(Recipient::bare(7), "accountant");
        store.add_rule(NotificationRule {
            template: template(json!({
                "title": "Invoice {{invoice_number}} overdue",
                "recipient_roles": ["accountant"],
            })),
            ..rule(1, "invoice.*")
        });
        let engine = Engine::new(
            Stores::from_shared(Arc::clone(&store)),
            Transports::new(),
            EngineConfig::default(),
        );

        let new = NewEvent::new("invoicing", "invoice.overdue")
            .with_payload(json!({"invoice_number": "INV-1"}));
        let Submission::Accepted(event) = engine.intake.submit(new).await.unwrap() else {
            panic!("expected accepted event");
        };
        let report = engine.processor.process_event(event.id).await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(store.notifications()[0].title, "Invoice INV-1 overdue");
        assert!(!engine.status.processor_running());
    }
}
