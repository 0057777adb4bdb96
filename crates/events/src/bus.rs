//! In-process host event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`HostEventBus`] plays the role of the native shell's named event feed:
//! the relay publishes raw job frames under a per-job event name and any
//! number of listeners receive them. Shared via `Arc<HostEventBus>`.

use livesync_core::Timestamp;
use serde_json::Value;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// HostEvent
// ---------------------------------------------------------------------------

/// A single named event emitted by the host.
#[derive(Debug, Clone)]
pub struct HostEvent {
    /// Event feed name, e.g. `"sync:7"` or `"move-library"`.
    pub name: String,

    /// Raw JSON text of one job message, forwarded verbatim.
    pub payload: String,

    /// When the host emitted the event (UTC).
    pub timestamp: Timestamp,
}

impl HostEvent {
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Build an event whose payload is a serialized JSON value.
    pub fn json(name: impl Into<String>, payload: &Value) -> Self {
        Self::new(name, payload.to_string())
    }
}

// ---------------------------------------------------------------------------
// HostEventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for host events.
///
/// # Usage
///
/// ```rust
/// use livesync_events::bus::{HostEvent, HostEventBus};
///
/// let bus = HostEventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(HostEvent::new("sync:7", r#"{"type":"log","line":"hi"}"#));
/// ```
pub struct HostEventBus {
    sender: broadcast::Sender<HostEvent>,
}

impl HostEventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current listeners.
    ///
    /// With no listeners the event is silently dropped.
    pub fn publish(&self, event: HostEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Register a listener for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HostEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
