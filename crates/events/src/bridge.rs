//! Contract between a live channel and a native host that relays job
//! frames on the client's behalf.

use std::time::Duration;

use async_trait::async_trait;
use livesync_core::JobId;
use tokio::sync::broadcast;

use crate::bus::HostEvent;

/// A host process that owns the real server connection and re-emits its
/// frames as named events.
///
/// Callers must [`listen`](Self::listen) before calling
/// [`start_relay`](Self::start_relay) so the first frames are not missed,
/// and must always call [`stop_relay`](Self::stop_relay) when done, even if
/// `start_relay` never completed.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Register a listener on the host event feed.
    fn listen(&self) -> broadcast::Receiver<HostEvent>;

    /// Ask the host to start relaying frames for `job`.
    ///
    /// Resolves once the host's connection to the server is live.
    async fn start_relay(&self, job: JobId) -> Result<(), BridgeError>;

    /// Ask the host to stop relaying frames for `job`. Idempotent.
    async fn stop_relay(&self, job: JobId);
}

/// Errors reported by a host bridge when starting a relay.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The host could not reach the server.
    #[error("Relay connect failed: {0}")]
    Connect(String),

    /// The host did not confirm the relay within the allowed time.
    #[error("Relay not ready after {0:?}")]
    Timeout(Duration),

    /// The host itself is gone (shut down, channel closed).
    #[error("Host unavailable: {0}")]
    Unavailable(String),
}
