//! Host-boundary types for the Nuvo Essentia bridge.
//!
//! This crate defines the types that cross between the bridge and the
//! home-automation host:
//! - the structured status of a zone and the driver values derived from it
//! - the inbound zone and controller commands
//! - the events the bridge reports to the host
//!
//! # Modules
//! - [`zone`] - Zone addressing, status and driver types
//! - [`command`] - Inbound command names and payload parsing
//! - [`events`] - Host-facing report events (HostEvent)

pub mod command;
pub mod events;
pub mod zone;

// Re-export commonly used types at crate root
pub use command::{CommandRequest, ControllerCommand, ZoneCommand};
pub use events::HostEvent;
pub use zone::{Driver, DriverUpdate, ZoneAddress, ZoneStatus, SOURCE_COUNT, ZONE_COUNT};
