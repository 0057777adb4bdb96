//! The reducer callback handed to a transport when a channel opens.

use std::sync::Arc;

use livesync_core::{parse_message, ChannelState, JobId, Message};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Write side of one channel's state.
///
/// Every transport feeds its frames through a `MessageSink`; it is the
/// only thing allowed to mutate the channel state while the channel is
/// open. Each mutation first checks the channel's cancellation token, so
/// nothing lands after the channel is closed.
#[derive(Clone)]
pub struct MessageSink {
    job: JobId,
    state: Arc<watch::Sender<ChannelState>>,
    cancel: CancellationToken,
}

impl MessageSink {
    pub(crate) fn new(
        job: JobId,
        state: Arc<watch::Sender<ChannelState>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { job, state, cancel }
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the channel is closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// The channel's cancellation token, for helpers that take one.
    pub(crate) fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Apply one message. Returns whether the state changed.
    pub fn deliver(&self, msg: &Message) -> bool {
        // Checked under the state lock so a concurrent close() wins.
        self.state
            .send_if_modified(|state| !self.is_closed() && state.apply(msg))
    }

    /// Decode a raw JSON frame and apply it.
    ///
    /// Malformed frames are logged and dropped; one bad frame must not end
    /// an otherwise healthy stream.
    pub fn deliver_text(&self, text: &str) -> bool {
        match parse_message(text) {
            Ok(msg) => self.deliver(&msg),
            Err(e) => {
                tracing::warn!(
                    job = %self.job,
                    error = %e,
                    raw_message = %text,
                    "Dropping malformed job frame",
                );
                false
            }
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.send_if_modified(|state| {
            if self.is_closed() || state.connected == connected {
                return false;
            }
            state.connected = connected;
            true
        });
    }

    /// Discard the current run's data, as `clear()` does.
    pub fn reset(&self) {
        self.state.send_if_modified(|state| {
            if self.is_closed() {
                return false;
            }
            state.clear();
            true
        });
    }
}
