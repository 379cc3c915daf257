//! Per-zone adapter
//!
//! Bridges host commands for one amplifier zone to the gateway: builds the
//! wire command, runs a single exchange, decodes the status reply, caches
//! it and reports each present field as a driver update on the bus.
//!
//! The cached status is owned here and only written by this zone's own
//! command path. Callers serialize commands per zone (the controller keeps
//! each adapter behind a mutex).

use chrono::{DateTime, Utc};
use nuvo_events::{DriverUpdate, ZoneAddress, ZoneCommand, ZoneStatus, SOURCE_COUNT};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::adapters::codec::{self, WireCommand, VOLUME_CAP};
use crate::adapters::transport::GatewayClient;
use crate::bus::{BusEvent, SharedBus};
use crate::error::{NuvoError, NuvoResult};

/// Result of a zone command that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Sent to the amplifier; carries the status it replied with
    Applied(ZoneStatus),
    /// Payload not meaningful for the amplifier, nothing was sent
    Ignored,
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Zone state as exposed to the host API
#[derive(Debug, Clone, Serialize)]
pub struct ZoneSnapshot {
    pub zone: ZoneAddress,
    pub name: String,
    /// `None` until the first successful exchange
    pub status: Option<ZoneStatus>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct ZoneAdapter {
    zone: ZoneAddress,
    name: String,
    client: Arc<GatewayClient>,
    bus: SharedBus,
    status: Option<ZoneStatus>,
    updated_at: Option<DateTime<Utc>>,
}

impl ZoneAdapter {
    pub fn new(zone: ZoneAddress, name: String, client: Arc<GatewayClient>, bus: SharedBus) -> Self {
        Self {
            zone,
            name,
            client,
            bus,
            status: None,
            updated_at: None,
        }
    }

    pub fn zone(&self) -> ZoneAddress {
        self.zone
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last successfully parsed status, if any
    pub fn cached_status(&self) -> Option<ZoneStatus> {
        self.status
    }

    pub fn snapshot(&self) -> ZoneSnapshot {
        ZoneSnapshot {
            zone: self.zone,
            name: self.name.clone(),
            status: self.status,
            updated_at: self.updated_at,
        }
    }

    /// Run a host command against this zone.
    pub async fn handle(&mut self, command: ZoneCommand) -> NuvoResult<CommandOutcome> {
        match command {
            ZoneCommand::SetVolume(percent) => self.set_volume(percent).await,
            ZoneCommand::SetGroup(group) => self.set_group(group).await,
            ZoneCommand::SetSource(source) => self.set_source(source).await,
            ZoneCommand::ToggleMute => self.toggle_mute().await,
            ZoneCommand::On => self.turn_on().await,
            ZoneCommand::Off => self.turn_off().await,
            ZoneCommand::Query => self.query().await,
        }
    }

    pub async fn query(&mut self) -> NuvoResult<CommandOutcome> {
        self.send(WireCommand::Status).await
    }

    pub async fn turn_on(&mut self) -> NuvoResult<CommandOutcome> {
        self.send(WireCommand::On).await
    }

    pub async fn turn_off(&mut self) -> NuvoResult<CommandOutcome> {
        self.send(WireCommand::Off).await
    }

    /// Set volume percent. 0 (or less) is not a target the host can set
    /// and is ignored; values above 100 are treated as 100.
    pub async fn set_volume(&mut self, percent: i64) -> NuvoResult<CommandOutcome> {
        if percent <= 0 {
            debug!(zone = %self.zone, percent, "Ignoring volume target");
            return Ok(CommandOutcome::Ignored);
        }
        let percent = percent.min(100) as u8;
        let device = codec::denormalize(percent, VOLUME_CAP);
        info!(zone = %self.zone, percent, device, "Setting volume");
        self.send(WireCommand::Volume(device)).await
    }

    /// Set group 1-9; 0 is treated as "not set" and ignored.
    pub async fn set_group(&mut self, group: i64) -> NuvoResult<CommandOutcome> {
        match u8::try_from(group) {
            Ok(group @ 1..=9) => self.send(WireCommand::Group(group)).await,
            _ => {
                debug!(zone = %self.zone, group, "Ignoring group target");
                Ok(CommandOutcome::Ignored)
            }
        }
    }

    /// Select source 1-6; anything else is ignored.
    pub async fn set_source(&mut self, source: i64) -> NuvoResult<CommandOutcome> {
        match u8::try_from(source) {
            Ok(source) if (1..=SOURCE_COUNT).contains(&source) => {
                self.send(WireCommand::Source(source)).await
            }
            _ => {
                debug!(zone = %self.zone, source, "Ignoring source target");
                Ok(CommandOutcome::Ignored)
            }
        }
    }

    /// Flip mute relative to the last cached status.
    ///
    /// Fails with [`NuvoError::NoCachedStatus`] if no status has been
    /// fetched yet; the current mute state is never guessed.
    pub async fn toggle_mute(&mut self) -> NuvoResult<CommandOutcome> {
        let cached = self
            .status
            .ok_or_else(|| NuvoError::NoCachedStatus(self.zone.to_string()))?;
        let command = if cached.muted == Some(true) {
            WireCommand::MuteOff
        } else {
            WireCommand::MuteOn
        };
        self.send(command).await
    }

    async fn send(&mut self, command: WireCommand) -> NuvoResult<CommandOutcome> {
        let wire = command.for_zone(self.zone);
        let reply = self.client.exchange(&wire).await?;
        let status = codec::parse(&reply)?;
        self.update_status(status);
        Ok(CommandOutcome::Applied(status))
    }

    fn update_status(&mut self, status: ZoneStatus) {
        debug!(zone = %self.zone, ?status, "Zone status updated");
        self.status = Some(status);
        self.updated_at = Some(Utc::now());
        for update in DriverUpdate::from_status(self.zone, &status) {
            self.bus.publish(BusEvent::DriverReported(update));
        }
    }
}
