//! Running-state flags reported by the health endpoint.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared liveness flags for the processor and scheduler.
#[derive(Debug, Default)]
pub struct EngineStatus {
    processor_running: AtomicBool,
    scheduler_running: AtomicBool,
}

impl EngineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_processor_running(&self, running: bool) {
        self.processor_running.store(running, Ordering::SeqCst);
    }

    pub fn set_scheduler_running(&self, running: bool) {
        self.scheduler_running.store(running, Ordering::SeqCst);
    }

    pub fn processor_running(&self) -> bool {
        self.processor_running.load(Ordering::SeqCst)
    }

    pub fn scheduler_running(&self) -> bool {
        self.scheduler_running.load(Ordering::SeqCst)
    }
}
