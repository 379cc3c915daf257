//! Host-facing report events.
//!
//! `HostEvent` is the subset of the bridge's internal bus events that is
//! forwarded to the host over SSE. Host integrations depend on this crate
//! instead of duplicating types.

use crate::zone::{DriverUpdate, ZoneAddress};
use serde::{Deserialize, Serialize};

/// Events reported to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum HostEvent {
    /// A zone node was registered with the host
    ZoneDiscovered {
        zone: ZoneAddress,
        /// Display name
        name: String,
    },

    /// A driver value changed on a zone
    DriverReported(DriverUpdate),

    /// A command could not be completed; no driver values were reported
    CommandFailed {
        /// Target zone, `None` for controller commands
        zone: Option<ZoneAddress>,
        command: String,
        /// Machine-readable error code
        code: String,
    },

    /// Firmware version reported by the amplifier at startup
    GatewayVersion { version: String },
}

impl HostEvent {
    /// Get the event type as a string (for logging/filtering)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ZoneDiscovered { .. } => "zone_discovered",
            Self::DriverReported(_) => "driver_reported",
            Self::CommandFailed { .. } => "command_failed",
            Self::GatewayVersion { .. } => "gateway_version",
        }
    }

    /// Zone the event refers to, if any
    pub fn zone(&self) -> Option<ZoneAddress> {
        match self {
            Self::ZoneDiscovered { zone, .. } => Some(*zone),
            Self::DriverReported(update) => Some(update.zone),
            Self::CommandFailed { zone, .. } => *zone,
            Self::GatewayVersion { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::Driver;

    #[test]
    fn test_driver_reported_serialization() {
        let zone = ZoneAddress::new(1).unwrap();
        let event = HostEvent::DriverReported(DriverUpdate::new(zone, Driver::Volume, 23));

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("DriverReported"));
        assert!(json.contains("GV4"));
        assert!(json.contains("z01"));

        let deserialized: HostEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deserialized);
    }

    #[test]
    fn test_command_failed_for_controller() {
        let event = HostEvent::CommandFailed {
            zone: None,
            command: "ALLOFF".to_string(),
            code: "connect_unreachable".to_string(),
        };
        assert_eq!(event.event_type(), "command_failed");
        assert_eq!(event.zone(), None);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CommandFailed");
        assert_eq!(json["payload"]["code"], "connect_unreachable");
    }

    #[test]
    fn test_event_zone() {
        let zone = ZoneAddress::new(5).unwrap();
        let event = HostEvent::ZoneDiscovered {
            zone,
            name: "Patio".to_string(),
        };
        assert_eq!(event.event_type(), "zone_discovered");
        assert_eq!(event.zone(), Some(zone));
    }
}
