//! Expiry Sweep Task
//!
//! Background task that periodically purges expired cache entries.
//!
//! `get` already drops an expired entry when it is read; the sweep reclaims
//! quota held by entries nobody reads again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::cache::CacheStore;

/// Spawns a background task that purges expired entries every `interval_secs`.
///
/// The task takes the write lock for the duration of each sweep.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(CacheStore::new(MemoryBackend::new(1 << 20))));
/// let sweep_handle = spawn_sweep_task(cache.clone(), 60);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<B>(cache: Arc<RwLock<CacheStore<B>>>, interval_secs: u64) -> JoinHandle<()>
where
    B: Backend + 'static,
{
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(interval_secs, "Starting expiry sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut cache_guard = cache.write().await;
                cache_guard.purge_expired()
            };

            if removed > 0 {
                info!(removed, "Expiry sweep removed entries");
            } else {
                debug!("Expiry sweep: nothing expired");
            }
        }
    })
}
