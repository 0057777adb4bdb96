//! One live channel: a job's state plus the transport feeding it.

use std::sync::Arc;
use std::time::Duration;

use livesync_core::{ChannelState, JobId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::sink::MessageSink;
use crate::transport::{Transport, TransportKind};

/// How long [`Channel::shutdown`] waits for the transport task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A job's live state and the transport task that writes it.
///
/// Readers take a [`watch::Receiver`] from [`subscribe`](Self::subscribe);
/// only the transport (through its [`MessageSink`]) and
/// [`clear`](Self::clear) ever write. Dropping the channel closes it.
pub struct Channel {
    job: JobId,
    kind: TransportKind,
    state: Arc<watch::Sender<ChannelState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Channel {
    /// Open a channel for `job` and start `transport` against it.
    pub fn open(job: JobId, transport: Transport) -> Self {
        Self::open_with_token(job, transport, CancellationToken::new())
    }

    /// Like [`open`](Self::open), but closing is also driven by `cancel`
    /// (typically a child of a registry-wide token).
    pub fn open_with_token(job: JobId, transport: Transport, cancel: CancellationToken) -> Self {
        let (tx, _) = watch::channel(ChannelState::default());
        let state = Arc::new(tx);
        let kind = transport.kind();

        let sink = MessageSink::new(job, Arc::clone(&state), cancel.clone());
        let task = transport.open(sink);

        tracing::info!(job = %job, transport = %kind, "Channel opened");

        Self {
            job,
            kind,
            state,
            cancel,
            task: Some(task),
        }
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> ChannelState {
        self.state.borrow().clone()
    }

    /// Reset the state to empty values without touching the transport.
    ///
    /// Call this before starting a new run on a job whose channel is
    /// already open, so the previous run's lines do not show up in it.
    pub fn clear(&self) {
        self.state.send_if_modified(|state| {
            if self.is_closed() {
                return false;
            }
            state.clear();
            true
        });
    }

    /// Release the transport. No message is applied after this returns.
    pub fn close(&self) {
        let was_open = !self.cancel.is_cancelled();
        self.cancel.cancel();
        self.state
            .send_if_modified(|state| std::mem::replace(&mut state.connected, false));
        if was_open {
            tracing::info!(job = %self.job, "Channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Close the channel and wait (bounded) for the transport task to
    /// finish its teardown.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                tracing::warn!(job = %self.job, "Transport task did not stop in time");
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("job", &self.job)
            .field("kind", &self.kind)
            .field("closed", &self.is_closed())
            .finish()
    }
}
