//! Bridge strategy: frames relayed by a native host over its event bus.

use std::sync::Arc;
use std::time::Duration;

use livesync_events::HostBridge;
use tokio::sync::broadcast::error::RecvError;

use crate::sink::MessageSink;

pub struct BridgeTransport {
    host: Arc<dyn HostBridge>,
    retry_delay: Duration,
}

impl BridgeTransport {
    /// `retry_delay` is the wait between a rejected start and the next one.
    pub fn new(host: Arc<dyn HostBridge>, retry_delay: Duration) -> Self {
        Self { host, retry_delay }
    }

    /// Listen on the host feed, ask the host to start relaying, and forward
    /// this job's events until the channel closes.
    ///
    /// The listener is registered once, before the first start request, so
    /// frames the host emits while starting are queued rather than lost. A
    /// rejected start only drops `connected` and is retried after
    /// `retry_delay`. The relay is always stopped on the way out, whether or
    /// not a start ever succeeded.
    pub(crate) async fn run(self, sink: MessageSink) {
        let job = sink.job();
        let event_name = job.event_name();
        let mut events = self.host.listen();

        'session: loop {
            let started = tokio::select! {
                _ = sink.closed() => break 'session,
                result = self.host.start_relay(job) => result,
            };

            if let Err(e) = started {
                tracing::warn!(
                    job = %job,
                    error = %e,
                    retry_in_ms = self.retry_delay.as_millis() as u64,
                    "Host relay did not start",
                );
                sink.set_connected(false);
                tokio::select! {
                    _ = sink.closed() => break 'session,
                    _ = tokio::time::sleep(self.retry_delay) => continue 'session,
                }
            }

            sink.set_connected(true);
            loop {
                tokio::select! {
                    _ = sink.closed() => break 'session,
                    event = events.recv() => match event {
                        Ok(event) if event.name == event_name => {
                            sink.deliver_text(&event.payload);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(job = %job, skipped, "Host event feed lagged");
                        }
                        Err(RecvError::Closed) => {
                            tracing::info!(job = %job, "Host event feed closed");
                            sink.set_connected(false);
                            sink.closed().await;
                            break 'session;
                        }
                    }
                }
            }
        }

        self.host.stop_relay(job).await;
    }
}
