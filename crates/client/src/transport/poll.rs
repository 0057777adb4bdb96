//! Poll strategy: repeated cursor requests against the live endpoint.

use std::sync::Arc;
use std::time::Duration;

use crate::api::BackendApi;
use crate::config::PollConfig;
use crate::sink::MessageSink;

/// Fetches `live(job, cursor)` on a timer and turns each response into
/// messages.
pub struct PollTransport {
    api: Arc<BackendApi>,
    config: PollConfig,
}

impl PollTransport {
    pub fn new(api: Arc<BackendApi>, config: PollConfig) -> Self {
        Self { api, config }
    }

    /// Poll until the channel closes.
    ///
    /// A poll channel counts as connected from the moment it opens; there
    /// is no handshake to wait for. A failed request leaves the cursor and
    /// the accumulated state untouched and retries after
    /// [`PollConfig::retry_backoff`].
    pub(crate) async fn run(self, sink: MessageSink) {
        let job = sink.job();
        let mut cursor: u64 = 0;

        sink.set_connected(true);

        loop {
            let response = tokio::select! {
                _ = sink.closed() => return,
                result = self.api.live(job, cursor) => result,
            };

            let delay = match response {
                Ok(live) if live.cursor < cursor => {
                    // The server dropped its buffer (a new run started).
                    tracing::info!(
                        job = %job,
                        sent = cursor,
                        received = live.cursor,
                        "Live cursor went backwards, restarting from zero",
                    );
                    sink.reset();
                    cursor = 0;
                    Duration::ZERO
                }
                Ok(live) => {
                    cursor = live.cursor;
                    let active = live.status.is_active();
                    for msg in live.into_messages() {
                        sink.deliver(&msg);
                    }
                    if active {
                        self.config.fast_interval
                    } else {
                        self.config.slow_interval
                    }
                }
                Err(e) => {
                    tracing::debug!(job = %job, cursor, error = %e, "Live poll failed");
                    self.config.retry_backoff
                }
            };

            tokio::select! {
                _ = sink.closed() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
