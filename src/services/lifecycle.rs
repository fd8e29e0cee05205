//! Lifecycle — session expiry timer and coarse sweep.
//!
//! DESIGN
//! ======
//! The store owns exactly one `ExpiryTimer`. Scheduling a new one aborts the
//! previous task, and the store only schedules or cancels while holding its
//! lock, so replacement and rescheduling are atomic. The timer callback goes
//! back through the store (same lock as any command) and carries the
//! session generation it was scheduled for, so a stale timer is a no-op.
//!
//! A background sweep re-checks expiry on a fixed interval in case the
//! process was suspended past the deadline.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::services::session::SessionStore;

/// Single outstanding expiry task.
#[derive(Debug, Default)]
pub struct ExpiryTimer {
    handle: Option<JoinHandle<()>>,
}

impl ExpiryTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending timer with one that runs `on_fire` once the wall
    /// clock reaches `deadline`.
    ///
    /// Outside a tokio runtime no task is spawned; lazy expiry on access
    /// still applies.
    pub fn schedule_at<F>(&mut self, deadline: OffsetDateTime, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_scheduled() {
            debug!("lifecycle: replacing pending expiry timer");
        }
        self.cancel();
        let Ok(runtime) = Handle::try_current() else {
            debug!("lifecycle: no runtime, expiry timer not scheduled");
            return;
        };
        self.handle = Some(runtime.spawn(async move {
            // Sleep is monotonic, the deadline is wall-clock; re-check until
            // the wall clock has actually passed it.
            while let Ok(wait) = Duration::try_from(deadline - OffsetDateTime::now_utc()) {
                if wait.is_zero() {
                    break;
                }
                tokio::time::sleep(wait).await;
            }
            on_fire();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawn the periodic expiry sweep. Returns a handle for shutdown.
pub fn spawn_sweep_task(store: SessionStore, interval: Duration) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "session expiry sweep configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if store.expire_due(None) {
                info!("sweep: expired session discarded");
            }
        }
    })
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
