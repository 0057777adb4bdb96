//! Push strategy: a direct WebSocket to the job's socket path.

use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::reconnect::{connect_with_backoff, BackoffConfig};
use crate::sink::MessageSink;

/// Reads pre-formed job messages from a server socket.
pub struct PushTransport {
    url: String,
    backoff: BackoffConfig,
}

impl PushTransport {
    pub fn new(url: String, backoff: BackoffConfig) -> Self {
        Self { url, backoff }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect (with backoff) and forward frames until the socket ends or
    /// the channel closes.
    ///
    /// There is no reconnect after a session ends: the server replays the
    /// run's buffered lines to every new socket, so a second session would
    /// duplicate them.
    pub(crate) async fn run(self, sink: MessageSink) {
        let job = sink.job();
        let cancel = sink.token();

        let Some(mut ws) = connect_with_backoff(&self.url, &self.backoff, &cancel).await else {
            return;
        };

        tracing::info!(job = %job, url = %self.url, "Job socket open");
        sink.set_connected(true);

        loop {
            tokio::select! {
                _ = sink.closed() => {
                    let _ = ws.close(None).await;
                    return;
                }
                frame = ws.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        sink.deliver_text(&text);
                    }
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        tracing::info!(job = %job, ?frame, "Server closed job socket");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(job = %job, error = %e, "Job socket receive error");
                        break;
                    }
                    None => break,
                }
            }
        }

        sink.set_connected(false);
    }
}
