//! Live job status distribution for the sync manager.
//!
//! Turns the backend's per-job message streams into one continuously
//! updated [`ChannelState`](livesync_core::ChannelState) per job, over
//! whichever transport the host supports:
//!
//! - [`transport`] -- push (WebSocket), poll (HTTP cursor) and bridge
//!   (host-relayed) strategies behind one contract.
//! - [`channel`] -- one job's state plus the transport feeding it.
//! - [`registry`] -- the set of open channels, reconciled against the
//!   interesting job set.
//! - [`aggregator`] / [`supervisor`] -- snapshot polling and the loop that
//!   keeps the registry in step with it.

pub mod aggregator;
pub mod api;
pub mod channel;
pub mod config;
pub mod reconnect;
pub mod registry;
pub mod sink;
pub mod supervisor;
pub mod transport;

pub use aggregator::StatusAggregator;
pub use api::{ApiError, BackendApi, TriggerAllResponse, TriggerResponse};
pub use channel::Channel;
pub use config::{ClientConfig, ConfigError, HostKind, PollConfig};
pub use registry::{ChannelRegistry, Reconciled, RegistryError, RegistryEvent};
pub use sink::MessageSink;
pub use supervisor::{rearm_after_finish, run_supervisor, InterestPolicy};
pub use transport::{HostEnvironment, StrategySelector, Transport, TransportKind};
