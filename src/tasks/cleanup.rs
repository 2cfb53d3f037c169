//! TTL Cleanup Task
//!
//! Background task that periodically reclaims expired entries.
//!
//! Reads already treat expired entries as missing; the sweep only gives the
//! memory back sooner.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

// == Sweep ==
/// A store whose expired entries can be reclaimed in bulk.
pub trait Sweep: Send + Sync + 'static {
    /// Removes every expired entry and returns how many were removed.
    fn purge_expired(&self) -> usize;
}

/// Spawns a background task that periodically purges expired entries.
///
/// The task runs until aborted through the returned handle.
///
/// # Example
/// ```ignore
/// let local = Arc::new(LocalCache::with_capacity(1000, Duration::from_secs(60)));
/// let cleanup_handle = spawn_cleanup_task(local.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<S: Sweep>(target: Arc<S>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting TTL cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = target.purge_expired();

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
