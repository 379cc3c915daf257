//! Device registry
//!
//! Keeps the last reported value of every driver for every zone. Reports
//! only carry the fields present in a status line, so a value that is not
//! reported keeps whatever was last seen.

use nuvo_events::{Driver, DriverUpdate, ZoneAddress};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bus::BusEvent;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ZoneDrivers {
    pub name: Option<String>,
    pub drivers: BTreeMap<Driver, DriverUpdate>,
}

#[derive(Default)]
pub struct DeviceRegistry {
    zones: RwLock<HashMap<ZoneAddress, ZoneDrivers>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn apply(&self, event: &BusEvent) {
        match event {
            BusEvent::ZoneDiscovered { zone, name } => {
                let mut zones = self.zones.write().await;
                zones.entry(*zone).or_default().name = Some(name.clone());
            }
            BusEvent::DriverReported(update) => {
                let mut zones = self.zones.write().await;
                zones
                    .entry(update.zone)
                    .or_default()
                    .drivers
                    .insert(update.driver, update.clone());
            }
            _ => {}
        }
    }

    pub async fn drivers(&self, zone: ZoneAddress) -> Option<ZoneDrivers> {
        self.zones.read().await.get(&zone).cloned()
    }

    pub async fn value(&self, zone: ZoneAddress, driver: Driver) -> Option<i32> {
        self.zones
            .read()
            .await
            .get(&zone)
            .and_then(|z| z.drivers.get(&driver))
            .map(|update| update.value)
    }

    /// Follow the bus until shutdown.
    ///
    /// `rx` must be subscribed before any adapter starts publishing, so
    /// take it from the bus before spawning this future.
    pub async fn run(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<BusEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(BusEvent::ShuttingDown { .. }) => break,
                    Ok(event) => self.apply(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Device registry lagged behind bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        info!("Device registry stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::create_bus;
    use nuvo_events::ZoneStatus;

    fn report(zone: ZoneAddress, status: &ZoneStatus) -> Vec<BusEvent> {
        DriverUpdate::from_status(zone, status)
            .into_iter()
            .map(BusEvent::DriverReported)
            .collect()
    }

    #[tokio::test]
    async fn test_unreported_values_are_retained() {
        let registry = DeviceRegistry::new();
        let zone = ZoneAddress::new(2).unwrap();

        let on = ZoneStatus {
            power: true,
            group: Some(1),
            source: Some(3),
            muted: Some(false),
            volume: Some(60),
        };
        for event in report(zone, &on) {
            registry.apply(&event).await;
        }
        for event in report(zone, &ZoneStatus::off()) {
            registry.apply(&event).await;
        }

        assert_eq!(registry.value(zone, Driver::Power).await, Some(0));
        assert_eq!(registry.value(zone, Driver::Volume).await, Some(60));
        assert_eq!(registry.value(zone, Driver::Source).await, Some(3));
    }

    #[tokio::test]
    async fn test_discovery_records_name() {
        let registry = DeviceRegistry::new();
        let zone = ZoneAddress::new(5).unwrap();
        registry
            .apply(&BusEvent::ZoneDiscovered {
                zone,
                name: "Patio".to_string(),
            })
            .await;

        let drivers = registry.drivers(zone).await.unwrap();
        assert_eq!(drivers.name.as_deref(), Some("Patio"));
        assert!(drivers.drivers.is_empty());
        assert!(registry.drivers(ZoneAddress::new(1).unwrap()).await.is_none());
    }

    #[tokio::test]
    async fn test_run_follows_bus_until_shutdown() {
        let bus = create_bus();
        let registry = Arc::new(DeviceRegistry::new());
        let task = tokio::spawn(registry.clone().run(bus.subscribe(), CancellationToken::new()));

        let zone = ZoneAddress::new(1).unwrap();
        bus.publish(BusEvent::DriverReported(DriverUpdate::new(zone, Driver::Volume, 42)));
        bus.publish(BusEvent::ShuttingDown { reason: None });
        task.await.unwrap();

        assert_eq!(registry.value(zone, Driver::Volume).await, Some(42));
    }

    #[tokio::test]
    async fn test_reports_published_before_first_poll_are_kept() {
        let bus = create_bus();
        let registry = Arc::new(DeviceRegistry::new());
        let zone = ZoneAddress::new(1).unwrap();

        // Published before the spawned task ever runs
        let rx = bus.subscribe();
        bus.publish(BusEvent::ZoneDiscovered {
            zone,
            name: "Kitchen".to_string(),
        });
        bus.publish(BusEvent::DriverReported(DriverUpdate::new(zone, Driver::Power, 1)));
        bus.publish(BusEvent::ShuttingDown { reason: None });

        tokio::spawn(registry.clone().run(rx, CancellationToken::new()))
            .await
            .unwrap();

        let drivers = registry.drivers(zone).await.unwrap();
        assert_eq!(drivers.name.as_deref(), Some("Kitchen"));
        assert_eq!(registry.value(zone, Driver::Power).await, Some(1));
    }
}
