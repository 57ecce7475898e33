//! Background refresh loop
//!
//! Periodically re-reads the engine configuration so the mirror catches
//! changes made outside this client. Refreshes run on the blocking pool
//! because engine and store calls are synchronous; the service lock keeps
//! them from interleaving with user mutations.

use crate::error::ConfigError;
use crate::service::ConfigService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn the refresh loop; the first pass runs immediately
///
/// Engine failures are logged and retried on the next tick. A store failure
/// is fatal to the store, so the loop stops.
pub fn spawn_refresher(service: Arc<ConfigService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let svc = service.clone();
            match tokio::task::spawn_blocking(move || svc.refresh()).await {
                Ok(Ok(report)) => {
                    for skipped in &report.skipped {
                        tracing::warn!(
                            collection = %skipped.collection,
                            key = %skipped.key,
                            "Record skipped during background refresh: {}",
                            skipped.reason
                        );
                    }
                }
                Ok(Err(ConfigError::StoreUnavailable(reason))) => {
                    tracing::error!("Local store unavailable, stopping refresh loop: {}", reason);
                    break;
                }
                Ok(Err(e)) => {
                    tracing::warn!("Background refresh failed: {}", e);
                }
                Err(e) => {
                    tracing::error!("Refresh task panicked: {}", e);
                    break;
                }
            }
        }
    })
}
