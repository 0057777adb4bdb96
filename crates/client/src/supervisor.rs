//! Drives the registry from the status snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use livesync_core::{JobId, StatusSnapshot};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::registry::ChannelRegistry;

/// Which jobs deserve an open channel.
#[derive(Debug, Clone, Default)]
pub struct InterestPolicy {
    /// Also watch queued sources, not only running ones.
    pub include_queued: bool,
    /// Jobs kept open regardless of the snapshot (e.g. the library move).
    pub pinned: BTreeSet<JobId>,
}

impl InterestPolicy {
    pub fn interesting(&self, snapshot: &StatusSnapshot) -> BTreeSet<JobId> {
        let mut wanted = snapshot.interesting(self.include_queued);
        wanted.extend(self.pinned.iter().copied());
        wanted
    }
}

/// Reconcile `registry` against every new snapshot until `cancel` fires or
/// the snapshot feed ends.
pub async fn run_supervisor(
    registry: Arc<ChannelRegistry>,
    mut snapshots: watch::Receiver<StatusSnapshot>,
    policy: InterestPolicy,
    cancel: CancellationToken,
) {
    loop {
        let wanted = policy.interesting(&snapshots.borrow_and_update());
        let changes = registry.reconcile(&wanted).await;
        for job in &changes.opened {
            tracing::info!(job = %job, "Watching job");
        }
        for job in &changes.closed {
            tracing::info!(job = %job, "Stopped watching job");
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::debug!("Snapshot feed ended");
                    break;
                }
            }
        }
    }
}

/// Keep a long-lived channel ready for the next run of `job`.
///
/// Some jobs (the library move) never report `idle` between runs, so a
/// channel held open across runs would stay on the first run's terminal
/// status. Each time `job` finishes, its channel is cleared after `linger`;
/// the task then waits for the next run to start before arming again.
pub async fn rearm_after_finish(
    registry: Arc<ChannelRegistry>,
    job: JobId,
    linger: Duration,
    cancel: CancellationToken,
) {
    loop {
        let Some(mut state) = registry.state(job).await else {
            // Not open (yet); look again later.
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(linger) => continue,
            }
        };

        let finished = async { state.wait_for(|s| s.status.is_terminal()).await.is_ok() };
        let finished = tokio::select! {
            _ = cancel.cancelled() => return,
            finished = finished => finished,
        };
        if !finished {
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(linger) => {}
        }
        if registry.clear(job).await {
            tracing::debug!(job = %job, "Channel cleared for the next run");
        }

        let next_run = async { state.wait_for(|s| s.status.is_active()).await.is_ok() };
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = next_run => {}
        }
    }
}
