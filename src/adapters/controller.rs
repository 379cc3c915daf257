//! Nuvo Essentia controller
//!
//! Owns the six zone adapters and the shared gateway client. Handles the
//! controller-level commands (discover, all on, all off), the startup
//! version probe and the periodic status poll, and is the host-facing
//! boundary where command failures are logged and reported.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use nuvo_events::{CommandRequest, ControllerCommand, ZoneAddress, ZoneCommand};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::adapters::codec::{ALL_OFF, VERSION_QUERY};
use crate::adapters::traits::{AdapterContext, AdapterLogic};
use crate::adapters::transport::GatewayClient;
use crate::adapters::zone::{CommandOutcome, ZoneAdapter, ZoneSnapshot};
use crate::bus::{BusEvent, SharedBus};
use crate::config::Config;
use crate::error::{ErrorCode, NuvoError, NuvoResult};

pub struct NuvoController {
    client: Arc<GatewayClient>,
    zones: BTreeMap<ZoneAddress, Mutex<ZoneAdapter>>,
    bus: SharedBus,
    poll_interval: Option<Duration>,
}

impl NuvoController {
    pub fn new(config: &Config, bus: SharedBus) -> Self {
        let client = Arc::new(GatewayClient::from_config(&config.gateway));
        let poll_interval =
            (config.poll_interval_secs > 0).then(|| Duration::from_secs(config.poll_interval_secs));
        Self::with_client(client, config, bus, poll_interval)
    }

    pub fn with_client(
        client: Arc<GatewayClient>,
        config: &Config,
        bus: SharedBus,
        poll_interval: Option<Duration>,
    ) -> Self {
        let zones = ZoneAddress::all()
            .map(|zone| {
                let adapter =
                    ZoneAdapter::new(zone, config.zone_name(zone), client.clone(), bus.clone());
                (zone, Mutex::new(adapter))
            })
            .collect();
        Self {
            client,
            zones,
            bus,
            poll_interval,
        }
    }

    pub fn gateway_addr(&self) -> String {
        self.client.addr()
    }

    /// Current view of every zone, in zone order
    pub async fn snapshots(&self) -> Vec<ZoneSnapshot> {
        let mut snapshots = Vec::with_capacity(self.zones.len());
        for adapter in self.zones.values() {
            snapshots.push(adapter.lock().await.snapshot());
        }
        snapshots
    }

    pub async fn snapshot(&self, zone: ZoneAddress) -> NuvoResult<ZoneSnapshot> {
        let adapter = self
            .zones
            .get(&zone)
            .ok_or_else(|| NuvoError::UnknownZone(zone.to_string()))?;
        Ok(adapter.lock().await.snapshot())
    }

    /// Run a command on one zone. The zone's mutex keeps a single exchange
    /// in flight per zone.
    pub async fn zone_command(
        &self,
        zone: ZoneAddress,
        command: ZoneCommand,
    ) -> NuvoResult<CommandOutcome> {
        let adapter = self
            .zones
            .get(&zone)
            .ok_or_else(|| NuvoError::UnknownZone(zone.to_string()))?;
        let mut adapter = adapter.lock().await;
        adapter.handle(command).await
    }

    /// Host entry point for zone commands addressed by name.
    ///
    /// Unknown zones and command names are errors; gateway and protocol
    /// failures are logged, reported on the bus and returned as `false`.
    pub async fn dispatch_zone(&self, address: &str, request: &CommandRequest) -> NuvoResult<bool> {
        let zone: ZoneAddress = address
            .parse()
            .map_err(|_| NuvoError::UnknownZone(address.to_string()))?;
        let command = ZoneCommand::try_from(request)?;
        info!(%zone, command = command.name(), value = ?request.value, "Zone command");

        match self.zone_command(zone, command).await {
            Ok(outcome) => Ok(outcome.is_applied()),
            Err(e) => {
                self.report_failure(Some(zone), command.name(), &e);
                Ok(false)
            }
        }
    }

    /// Host entry point for controller commands addressed by name.
    pub async fn dispatch_controller(&self, request: &CommandRequest) -> NuvoResult<bool> {
        let command = ControllerCommand::try_from(request)?;
        info!(command = command.name(), "Controller command");
        Ok(self.controller_command(command).await)
    }

    pub async fn controller_command(&self, command: ControllerCommand) -> bool {
        match command {
            ControllerCommand::Discover => self.discover().await > 0,
            ControllerCommand::AllOn => self.all_on().await > 0,
            ControllerCommand::AllOff => self.all_off().await,
        }
    }

    /// Register every zone with the host and fetch its status.
    /// Returns the number of zones that answered.
    pub async fn discover(&self) -> usize {
        for adapter in self.zones.values() {
            let adapter = adapter.lock().await;
            info!(zone = %adapter.zone(), name = adapter.name(), "Adding zone");
            self.bus.publish(BusEvent::ZoneDiscovered {
                zone: adapter.zone(),
                name: adapter.name().to_string(),
            });
        }
        self.query_all().await
    }

    /// Query every zone concurrently. Returns the number that answered.
    pub async fn query_all(&self) -> usize {
        self.each_zone(ZoneCommand::Query).await
    }

    pub async fn all_on(&self) -> usize {
        self.each_zone(ZoneCommand::On).await
    }

    /// Send the global all-off command, then refresh every zone.
    pub async fn all_off(&self) -> bool {
        match self.client.send(ALL_OFF).await {
            Ok(()) => {
                self.query_all().await;
                true
            }
            Err(e) => {
                self.report_failure(None, "ALLOFF", &e);
                false
            }
        }
    }

    /// Ask the amplifier for its firmware version and report it.
    pub async fn probe_version(&self) -> NuvoResult<String> {
        let reply = self.client.exchange(VERSION_QUERY).await?;
        let version = String::from_utf8_lossy(&reply).trim().to_string();
        info!(addr = %self.client.addr(), %version, "Amplifier version");
        self.bus.publish(BusEvent::GatewayVersion {
            version: version.clone(),
        });
        Ok(version)
    }

    async fn each_zone(&self, command: ZoneCommand) -> usize {
        let results = join_all(self.zones.keys().map(|&zone| async move {
            let result = self.zone_command(zone, command).await;
            if let Err(e) = &result {
                self.report_failure(Some(zone), command.name(), e);
            }
            result
        }))
        .await;
        results
            .iter()
            .filter(|r| matches!(r, Ok(outcome) if outcome.is_applied()))
            .count()
    }

    fn report_failure(&self, zone: Option<ZoneAddress>, command: &str, err: &NuvoError) {
        let target = zone.map(|z| z.to_string()).unwrap_or_else(|| "controller".to_string());
        match err {
            NuvoError::UnparsableResponse(raw) => {
                error!(
                    zone = %target,
                    command,
                    raw = %raw,
                    "Unparsable amplifier response (protocol or firmware mismatch?)"
                );
            }
            e if e.is_connectivity() => {
                error!(zone = %target, command, addr = %self.client.addr(), "Gateway error: {}", e);
            }
            e => warn!(zone = %target, command, "Command failed: {}", e),
        }
        self.bus.publish(BusEvent::CommandFailed {
            zone,
            command: command.to_string(),
            code: err.code().to_string(),
        });
    }
}

#[async_trait]
impl AdapterLogic for NuvoController {
    fn prefix(&self) -> &'static str {
        "nuvo"
    }

    fn target(&self) -> String {
        self.client.addr()
    }

    async fn init(&self) -> Result<()> {
        if let Err(e) = self.probe_version().await {
            warn!(addr = %self.client.addr(), "Version probe failed: {}", e);
        }
        let answered = self.discover().await;
        info!(answered, total = self.zones.len(), "Zones discovered");
        Ok(())
    }

    async fn run(&self, ctx: AdapterContext) -> Result<()> {
        let Some(period) = self.poll_interval else {
            debug!("Status polling disabled");
            ctx.shutdown.cancelled().await;
            return Ok(());
        };

        let mut poll_interval = interval(period);
        // First tick fires immediately; init already queried every zone
        poll_interval.tick().await;

        loop {
            tokio::select! {
                _ = ctx.shutdown.cancelled() => {
                    info!("Nuvo polling shutting down");
                    break;
                }
                _ = poll_interval.tick() => {
                    let answered = self.query_all().await;
                    debug!(answered, "Polled zones");
                }
            }
        }
        Ok(())
    }
}
