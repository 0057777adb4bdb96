//! Transport strategies and the selector that picks one per channel.
//!
//! The three delivery mechanisms are a closed set of variants behind one
//! contract: [`Transport::open`] takes a [`MessageSink`] and runs until the
//! sink's channel is closed. A channel never branches on which transport
//! it got; it only ever sees sink updates.

mod bridge;
mod poll;
mod push;

use std::fmt;
use std::sync::Arc;

use livesync_core::JobId;
use livesync_events::HostBridge;

use crate::api::BackendApi;
use crate::config::{ClientConfig, HostKind, PollConfig};
use crate::reconnect::BackoffConfig;
use crate::sink::MessageSink;

pub use bridge::BridgeTransport;
pub use poll::PollTransport;
pub use push::PushTransport;

/// Host capabilities, fixed for the lifetime of a session.
#[derive(Clone)]
pub enum HostEnvironment {
    /// Raw sockets available.
    Browser,
    /// Raw sockets blocked; only plain HTTP requests work.
    EmbeddedWebview,
    /// A native shell that relays frames over its event bus.
    NativeShell(Arc<dyn HostBridge>),
}

impl HostEnvironment {
    pub fn kind(&self) -> HostKind {
        match self {
            Self::Browser => HostKind::Browser,
            Self::EmbeddedWebview => HostKind::Webview,
            Self::NativeShell(_) => HostKind::Shell,
        }
    }
}

impl fmt::Debug for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Browser => f.write_str("Browser"),
            Self::EmbeddedWebview => f.write_str("EmbeddedWebview"),
            Self::NativeShell(_) => f.write_str("NativeShell"),
        }
    }
}

/// Which strategy a transport uses; for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Push,
    Poll,
    Bridge,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Push => "push",
            Self::Poll => "poll",
            Self::Bridge => "bridge",
        })
    }
}

/// One configured delivery mechanism for one job.
pub enum Transport {
    Push(PushTransport),
    Poll(PollTransport),
    Bridge(BridgeTransport),
}

impl Transport {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Push(_) => TransportKind::Push,
            Self::Poll(_) => TransportKind::Poll,
            Self::Bridge(_) => TransportKind::Bridge,
        }
    }

    /// Start delivering frames into `sink`.
    ///
    /// The returned task ends after the sink's channel is closed and the
    /// transport has released its resources.
    pub fn open(self, sink: MessageSink) -> tokio::task::JoinHandle<()> {
        let job = sink.job();
        let kind = self.kind();
        tracing::debug!(job = %job, transport = %kind, "Opening transport");

        tokio::spawn(async move {
            match self {
                Self::Push(push) => push.run(sink).await,
                Self::Poll(poll) => poll.run(sink).await,
                Self::Bridge(bridge) => bridge.run(sink).await,
            }
            tracing::debug!(job = %job, transport = %kind, "Transport released");
        })
    }
}

/// Chooses the transport for each channel from the host environment.
///
/// The choice is made once per channel open and never re-evaluated.
#[derive(Clone)]
pub struct StrategySelector {
    environment: HostEnvironment,
    api: Arc<BackendApi>,
    ws_url: String,
    poll: PollConfig,
    backoff: BackoffConfig,
}

impl StrategySelector {
    pub fn new(environment: HostEnvironment, api: Arc<BackendApi>, config: &ClientConfig) -> Self {
        Self {
            environment,
            api,
            ws_url: config.ws_url.trim_end_matches('/').to_string(),
            poll: config.poll,
            backoff: BackoffConfig::default(),
        }
    }

    /// Override the initial-connect backoff of the push strategy.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn environment(&self) -> &HostEnvironment {
        &self.environment
    }

    /// Build the transport for `job`.
    pub fn select(&self, job: JobId) -> Transport {
        match &self.environment {
            HostEnvironment::Browser => Transport::Push(PushTransport::new(
                format!("{}{}", self.ws_url, job.ws_path()),
                self.backoff.clone(),
            )),
            HostEnvironment::EmbeddedWebview => {
                Transport::Poll(PollTransport::new(Arc::clone(&self.api), self.poll))
            }
            HostEnvironment::NativeShell(host) => {
                Transport::Bridge(BridgeTransport::new(
                    Arc::clone(host),
                    self.poll.retry_backoff,
                ))
            }
        }
    }
}
