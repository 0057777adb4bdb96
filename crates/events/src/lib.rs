//! Native-host event plumbing for live job channels.
//!
//! - [`HostEventBus`] -- in-process named event feed backed by
//!   `tokio::sync::broadcast`.
//! - [`HostBridge`] -- what a channel needs from a host that relays job
//!   frames on its behalf.
//! - [`RelayHost`] -- a host that dials the server socket itself and
//!   publishes every frame on the bus.

pub mod bridge;
pub mod bus;
pub mod relay;

pub use bridge::{BridgeError, HostBridge};
pub use bus::{HostEvent, HostEventBus};
pub use relay::{RelayConfig, RelayHost};
