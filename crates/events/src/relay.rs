//! Host-side socket relay.
//!
//! [`RelayHost`] does what a native shell does for a webview that cannot
//! open raw sockets: it dials the server's job socket itself and
//! re-publishes every text frame on the [`HostEventBus`] under the job's
//! event name. One relay task runs per job; starting a relay for a job
//! that already has one replaces it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use livesync_core::{parse_message, JobId};
use tokio::sync::{broadcast, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bridge::{BridgeError, HostBridge};
use crate::bus::{HostEvent, HostEventBus};

/// How long `start_relay` waits for the server socket by default.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the relay host.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// WebSocket base URL of the server, e.g. `ws://127.0.0.1:8000`.
    pub ws_url: String,
    /// Upper bound on how long `start_relay` blocks.
    pub ready_timeout: Duration,
}

impl RelayConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

type Sessions = Arc<Mutex<HashMap<JobId, RelaySession>>>;

/// Bookkeeping for one running relay task.
struct RelaySession {
    id: Uuid,
    cancel: CancellationToken,
}

/// In-process [`HostBridge`] that relays job sockets onto a [`HostEventBus`].
pub struct RelayHost {
    bus: Arc<HostEventBus>,
    config: RelayConfig,
    sessions: Sessions,
    /// Master token, cancelled by [`shutdown`](Self::shutdown).
    cancel: CancellationToken,
}

impl RelayHost {
    pub fn new(bus: Arc<HostEventBus>, config: RelayConfig) -> Self {
        Self {
            bus,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// The bus this host publishes relayed frames on.
    pub fn bus(&self) -> &Arc<HostEventBus> {
        &self.bus
    }

    /// Number of jobs with a live relay task.
    pub fn active_relays(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Stop every relay.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down relay host");
        self.cancel.cancel();
        lock(&self.sessions).clear();
    }

    fn job_url(&self, job: JobId) -> String {
        format!("{}{}", self.config.ws_url.trim_end_matches('/'), job.ws_path())
    }
}

#[async_trait]
impl HostBridge for RelayHost {
    fn listen(&self) -> broadcast::Receiver<HostEvent> {
        self.bus.subscribe()
    }

    async fn start_relay(&self, job: JobId) -> Result<(), BridgeError> {
        if self.cancel.is_cancelled() {
            return Err(BridgeError::Unavailable("relay host shut down".into()));
        }

        let session = Uuid::new_v4();
        let cancel = self.cancel.child_token();
        // Registered before the first await so stop_relay can always find it.
        let previous = lock(&self.sessions).insert(
            job,
            RelaySession {
                id: session,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(job = %job, "Replacing existing relay");
            previous.cancel.cancel();
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(run_relay(
            job,
            session,
            self.job_url(job),
            Arc::clone(&self.bus),
            cancel,
            ready_tx,
            Arc::clone(&self.sessions),
        ));

        match tokio::time::timeout(self.config.ready_timeout, ready_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::Unavailable(
                "relay task ended before reporting".into(),
            )),
            Err(_) => {
                tracing::warn!(job = %job, "Timeout waiting for relay connection");
                Err(BridgeError::Timeout(self.config.ready_timeout))
            }
        }
    }

    async fn stop_relay(&self, job: JobId) {
        if let Some(session) = lock(&self.sessions).remove(&job) {
            tracing::debug!(job = %job, session = %session.id, "Stopping relay");
            session.cancel.cancel();
        }
    }
}

/// Connect to the job socket and forward frames until a terminal status,
/// socket close, or cancellation.
async fn run_relay(
    job: JobId,
    session: Uuid,
    url: String,
    bus: Arc<HostEventBus>,
    cancel: CancellationToken,
    ready: oneshot::Sender<Result<(), BridgeError>>,
    sessions: Sessions,
) {
    let event_name = job.event_name();

    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = ready.send(Err(BridgeError::Unavailable("relay stopped".into())));
            forget_session(&sessions, job, session);
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let mut ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            tracing::warn!(job = %job, url = %url, error = %e, "Relay connect failed");
            let _ = ready.send(Err(BridgeError::Connect(e.to_string())));
            forget_session(&sessions, job, session);
            return;
        }
    };

    tracing::info!(job = %job, session = %session, "Relay connected");
    let _ = ready.send(Ok(()));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws.close(None).await;
                break;
            }
            frame = ws.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let finished = is_terminal_frame(&text);
                    bus.publish(HostEvent::new(event_name.as_str(), text));
                    if finished {
                        tracing::debug!(job = %job, "Job reached terminal status, relay done");
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::info!(job = %job, ?frame, "Server closed relayed socket");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(job = %job, error = %e, "Relay receive error");
                    break;
                }
                None => break,
            }
        }
    }

    forget_session(&sessions, job, session);
    tracing::info!(job = %job, session = %session, "Relay exited");
}

fn is_terminal_frame(text: &str) -> bool {
    parse_message(text)
        .ok()
        .and_then(|msg| msg.status_value())
        .is_some_and(|status| status.is_terminal())
}

/// Remove the session entry, unless a newer relay already replaced it.
fn forget_session(sessions: &Sessions, job: JobId, session: Uuid) {
    let mut sessions = lock(sessions);
    if sessions.get(&job).is_some_and(|s| s.id == session) {
        sessions.remove(&job);
    }
}

fn lock(sessions: &Sessions) -> std::sync::MutexGuard<'_, HashMap<JobId, RelaySession>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}
