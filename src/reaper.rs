//! Periodic removal of stale hostnames.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::store::{CorrelationStore, SweepStats};

//------------ Reaper --------------------------------------------------------

/// Sweeps the store in fixed intervals.
///
/// Each pass drops all hostnames that have not been recorded for longer
/// than the retention window.
#[derive(Debug)]
pub struct Reaper {
    store: Arc<CorrelationStore>,
    interval: Duration,
    retention: Duration,
}

impl Reaper {
    pub fn new(
        store: Arc<CorrelationStore>,
        interval: Duration,
        retention: Duration,
    ) -> Self {
        Reaper {
            store,
            interval,
            retention,
        }
    }

    /// Performs a single sweep as of `now`.
    ///
    /// Returns `None` without touching the store if `now` is closer to the
    /// clock's origin than the retention window, in which case nothing can
    /// be stale yet.
    pub fn tick(&self, now: Instant) -> Option<SweepStats> {
        let Some(cutoff) = now.checked_sub(self.retention) else {
            debug!("Retention window reaches before clock origin, skipping");
            return None;
        };
        let stats = self.store.sweep(cutoff);
        info!("Cleanup removed {}/{} hostnames", stats.removed, stats.total);
        Some(stats)
    }

    /// Sweeps forever, starting one interval from now.
    pub async fn run(self) {
        let mut ticker =
            interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick(Instant::now());
        }
    }
}

//============ Testing =======================================================
