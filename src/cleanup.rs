//! Scheduled sweep of expired session cache entries.

use crate::auth::SessionResolver;
use std::time::Duration;
use tracing::debug;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Run all cleanup tasks once.
pub fn run_cleanup(resolver: &SessionResolver) {
    let now = resolver.clock().now();
    let purged = resolver.cache().purge_expired(now);
    if purged > 0 {
        debug!(
            purged,
            remaining = resolver.cache().len(),
            "Purged expired session cache entries"
        );
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(resolver: SessionResolver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&resolver);
        }
    })
}
