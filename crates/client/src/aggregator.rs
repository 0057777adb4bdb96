//! Periodic status snapshot poll.

use std::sync::Arc;
use std::time::Duration;

use livesync_core::StatusSnapshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::BackendApi;

/// Publishes the backend's coarse job status on a watch channel.
pub struct StatusAggregator;

impl StatusAggregator {
    /// Fetch the snapshot now and then every `interval` until `cancel`
    /// fires.
    ///
    /// Receivers are only notified when the snapshot actually changes. A
    /// failed fetch keeps the previous snapshot, so a backend hiccup never
    /// looks like "nothing is running".
    pub fn spawn(
        api: Arc<BackendApi>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (watch::Receiver<StatusSnapshot>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(StatusSnapshot::default());

        let handle = tokio::spawn(async move {
            let mut failures = 0u32;
            loop {
                let result = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = api.status_snapshot() => result,
                };

                match result {
                    Ok(snapshot) => {
                        if failures > 0 {
                            tracing::info!(failures, "Status snapshot available again");
                            failures = 0;
                        }
                        tx.send_if_modified(|current| {
                            if *current == snapshot {
                                return false;
                            }
                            *current = snapshot;
                            true
                        });
                    }
                    Err(e) => {
                        failures += 1;
                        if failures == 1 {
                            tracing::warn!(error = %e, "Status snapshot fetch failed");
                        } else {
                            tracing::debug!(error = %e, failures, "Status snapshot fetch failed");
                        }
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::debug!("Status aggregator stopped");
        });

        (rx, handle)
    }
}
