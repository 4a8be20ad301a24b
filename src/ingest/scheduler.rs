// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::service::RatingsService;

/// Spawn the background sync: one run when `interval` is `None`, otherwise a
/// run every `interval` starting immediately. Runs never overlap.
pub fn spawn_sync_scheduler(
    service: Arc<RatingsService>,
    interval: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(period) = interval else {
            let report = service.run_full_sync().await;
            tracing::info!(target: "sync", ?report, "startup sync done");
            return;
        };

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = service.run_full_sync().await;
            tracing::info!(
                target: "sync",
                inserted = report.inserted,
                truncated = report.truncated,
                next_in_secs = period.as_secs(),
                "scheduled sync tick"
            );
        }
    })
}
