//! Set of open channels, reconciled against the interesting job set.
//!
//! [`ChannelRegistry`] owns every open [`Channel`]. It only ever changes
//! *which* channels exist; a channel's state is written by that channel's
//! transport alone. Observers learn about channels coming and going via
//! [`ChannelRegistry::subscribe`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use livesync_core::{ChannelState, JobId};
use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, BackendApi, TriggerResponse};
use crate::channel::Channel;
use crate::transport::StrategySelector;

/// Broadcast channel capacity for registry events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Channel lifecycle notifications.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A channel was opened; `state` follows its live state.
    Opened {
        job: JobId,
        state: watch::Receiver<ChannelState>,
    },
    /// A channel was closed. Its last state stays readable on any receiver
    /// taken earlier.
    Closed { job: JobId },
}

/// What one [`ChannelRegistry::reconcile`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub opened: Vec<JobId>,
    pub closed: Vec<JobId>,
}

impl Reconciled {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }
}

/// Keeps exactly one channel open per interesting job.
pub struct ChannelRegistry {
    selector: StrategySelector,
    api: Arc<BackendApi>,
    channels: RwLock<HashMap<JobId, Channel>>,
    event_tx: broadcast::Sender<RegistryEvent>,
    /// Parent of every channel token; cancelled during shutdown.
    cancel: CancellationToken,
}

impl ChannelRegistry {
    pub fn new(selector: StrategySelector, api: Arc<BackendApi>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            selector,
            api,
            channels: RwLock::new(HashMap::new()),
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    /// Open a channel for `job` unless one is already open.
    ///
    /// Returns a receiver for the job's state either way. After
    /// [`shutdown`](Self::shutdown) nothing is opened and the receiver is
    /// already closed.
    pub async fn open(&self, job: JobId) -> watch::Receiver<ChannelState> {
        let mut channels = self.channels.write().await;
        if self.cancel.is_cancelled() {
            tracing::debug!(job = %job, "Registry shut down, not opening");
            return watch::channel(ChannelState::default()).1;
        }
        if let Some(channel) = channels.get(&job) {
            return channel.subscribe();
        }
        self.open_locked(&mut channels, job)
    }

    /// Close the channel for `job`. Returns `false` if none was open.
    pub async fn close(&self, job: JobId) -> bool {
        let removed = self.channels.write().await.remove(&job);
        match removed {
            Some(channel) => {
                channel.close();
                let _ = self.event_tx.send(RegistryEvent::Closed { job });
                true
            }
            None => false,
        }
    }

    /// Clear the state of an open channel. Returns `false` if none was open.
    pub async fn clear(&self, job: JobId) -> bool {
        match self.channels.read().await.get(&job) {
            Some(channel) => {
                channel.clear();
                true
            }
            None => false,
        }
    }

    /// Converge the open channels on `wanted`.
    ///
    /// Channels for ids no longer wanted are closed, channels for new ids
    /// are opened, and channels for ids present before and after are left
    /// untouched.
    pub async fn reconcile(&self, wanted: &BTreeSet<JobId>) -> Reconciled {
        if self.cancel.is_cancelled() {
            return Reconciled::default();
        }

        let mut channels = self.channels.write().await;
        let mut result = Reconciled::default();

        let stale: Vec<JobId> = channels
            .keys()
            .filter(|job| !wanted.contains(*job))
            .copied()
            .collect();
        for job in stale {
            if let Some(channel) = channels.remove(&job) {
                channel.close();
                let _ = self.event_tx.send(RegistryEvent::Closed { job });
                result.closed.push(job);
            }
        }

        for &job in wanted {
            if !channels.contains_key(&job) {
                self.open_locked(&mut channels, job);
                result.opened.push(job);
            }
        }

        result.closed.sort();
        if !result.is_empty() {
            tracing::debug!(
                opened = ?result.opened,
                closed = ?result.closed,
                active = channels.len(),
                "Channels reconciled",
            );
        }
        result
    }

    pub async fn active_ids(&self) -> BTreeSet<JobId> {
        self.channels.read().await.keys().copied().collect()
    }

    /// Current state of every open channel.
    pub async fn states(&self) -> BTreeMap<JobId, ChannelState> {
        self.channels
            .read()
            .await
            .iter()
            .map(|(job, channel)| (*job, channel.snapshot()))
            .collect()
    }

    pub async fn state(&self, job: JobId) -> Option<watch::Receiver<ChannelState>> {
        self.channels.read().await.get(&job).map(Channel::subscribe)
    }

    /// Whether any open channel is connected.
    pub async fn any_connected(&self) -> bool {
        self.channels
            .read()
            .await
            .values()
            .any(|channel| channel.snapshot().connected)
    }

    /// Start a new run of a source job.
    ///
    /// The job's channel (if open) is cleared *before* the trigger request
    /// so lines from the previous run never appear in the new one.
    pub async fn start_run(&self, job: JobId) -> Result<TriggerResponse, RegistryError> {
        let source_id = job.source_id().ok_or(RegistryError::NotTriggerable(job))?;
        self.clear(job).await;
        let response = self.api.trigger(source_id).await?;
        tracing::info!(job = %job, status = %response.status, "Run requested");
        Ok(response)
    }

    /// Close every channel and wait for their transports to stop.
    ///
    /// Waits up to 5 seconds per channel.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down channel registry");
        self.cancel.cancel();

        let drained: Vec<Channel> =
            self.channels.write().await.drain().map(|(_, c)| c).collect();
        for channel in drained {
            let job = channel.job();
            channel.shutdown().await;
            let _ = self.event_tx.send(RegistryEvent::Closed { job });
        }

        tracing::info!("Channel registry shut down complete");
    }

    // ---- private helpers ----

    fn open_locked(
        &self,
        channels: &mut HashMap<JobId, Channel>,
        job: JobId,
    ) -> watch::Receiver<ChannelState> {
        let transport = self.selector.select(job);
        let channel = Channel::open_with_token(job, transport, self.cancel.child_token());
        let state = channel.subscribe();
        channels.insert(job, channel);
        let _ = self.event_tx.send(RegistryEvent::Opened {
            job,
            state: state.clone(),
        });
        state
    }
}

/// Errors from registry operations that reach the backend.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Only source jobs can be triggered from the client.
    #[error("Job {0} cannot be triggered")]
    NotTriggerable(JobId),

    #[error(transparent)]
    Api(#[from] ApiError),
}
