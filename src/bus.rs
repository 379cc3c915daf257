//! In-process event bus
//!
//! Zone adapters publish driver reports here; the device registry and the
//! SSE endpoint subscribe. Lifecycle events (shutdown, adapter stopped)
//! travel on the same channel.

use nuvo_events::{DriverUpdate, HostEvent, ZoneAddress};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Channel capacity; slow subscribers see `Lagged` and skip ahead
const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    ZoneDiscovered { zone: ZoneAddress, name: String },
    DriverReported(DriverUpdate),
    CommandFailed {
        zone: Option<ZoneAddress>,
        command: String,
        code: String,
    },
    GatewayVersion { version: String },
    ShuttingDown { reason: Option<String> },
    AdapterStopped { adapter: String },
}

impl BusEvent {
    /// Host-facing form of this event; lifecycle events stay internal.
    pub fn to_host_event(&self) -> Option<HostEvent> {
        match self {
            Self::ZoneDiscovered { zone, name } => Some(HostEvent::ZoneDiscovered {
                zone: *zone,
                name: name.clone(),
            }),
            Self::DriverReported(update) => Some(HostEvent::DriverReported(update.clone())),
            Self::CommandFailed {
                zone,
                command,
                code,
            } => Some(HostEvent::CommandFailed {
                zone: *zone,
                command: command.clone(),
                code: code.clone(),
            }),
            Self::GatewayVersion { version } => Some(HostEvent::GatewayVersion {
                version: version.clone(),
            }),
            Self::ShuttingDown { .. } | Self::AdapterStopped { .. } => None,
        }
    }
}

pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: BusEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedBus = Arc<EventBus>;

pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::new())
}
