//! Application state shared across request handlers.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Durations;
use crate::scheduler::Scheduler;

/// Shared application state, passed to handlers via Axum's state extractor.
///
/// Every scheduling decision happens under the single scheduler lock;
/// handlers may run concurrently but serialize before touching the schedule.
/// The admission bounds are read-only after startup.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    scheduler: Mutex<Scheduler>,
    durations: Durations,
}

impl AppState {
    pub fn new(scheduler: Scheduler, durations: Durations) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                scheduler: Mutex::new(scheduler),
                durations,
            }),
        }
    }

    pub fn scheduler(&self) -> &Mutex<Scheduler> {
        &self.inner.scheduler
    }

    pub fn durations(&self) -> &Durations {
        &self.inner.durations
    }
}
