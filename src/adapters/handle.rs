//! Lifecycle runner for bus-driven adapters
//!
//! The handle subscribes to the bus when it is built, so a `ShuttingDown`
//! published while the adapter is still discovering zones is not missed.
//! A failed `init` is reported to the host as a controller-level
//! `CommandFailed` before the adapter acknowledges its stop.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::traits::{AdapterContext, AdapterLogic};
use crate::bus::{BusEvent, SharedBus};

/// Command name reported when adapter startup fails
pub const INIT_COMMAND: &str = "INIT";

/// Error code reported when adapter startup fails
pub const INIT_FAILED_CODE: &str = "adapter_init_failed";

pub struct AdapterHandle<T: AdapterLogic> {
    logic: Arc<T>,
    bus: SharedBus,
    rx: broadcast::Receiver<BusEvent>,
    shutdown: CancellationToken,
}

impl<T: AdapterLogic> AdapterHandle<T> {
    /// The logic is shared so the HTTP API can issue commands to it while
    /// the handle drives its lifecycle.
    pub fn new(logic: Arc<T>, bus: SharedBus, shutdown: CancellationToken) -> Self {
        let rx = bus.subscribe();
        Self {
            logic,
            bus,
            rx,
            shutdown,
        }
    }

    /// Run `init`, then the adapter's loop until it returns, the bus
    /// announces shutdown or the token is cancelled. Always ends with
    /// `AdapterStopped`.
    pub async fn run(mut self) -> Result<()> {
        let adapter = self.logic.prefix();
        let target = self.logic.target();
        info!(adapter, %target, "Starting adapter");

        if let Err(e) = self.logic.init().await {
            error!(adapter, %target, "Adapter init failed: {:#}", e);
            self.bus.publish(BusEvent::CommandFailed {
                zone: None,
                command: INIT_COMMAND.to_string(),
                code: INIT_FAILED_CODE.to_string(),
            });
            self.stopped(adapter);
            return Err(e);
        }

        let ctx = AdapterContext {
            shutdown: self.shutdown.clone(),
        };

        tokio::select! {
            result = self.logic.run(ctx) => match result {
                Ok(()) => info!(adapter, "Adapter loop finished"),
                Err(e) => error!(adapter, %target, "Adapter loop failed: {:#}", e),
            },
            reason = wait_for_shutdown(&mut self.rx) => {
                info!(adapter, reason = reason.as_deref().unwrap_or("none"), "Bus shutdown");
            }
            _ = self.shutdown.cancelled() => info!(adapter, "Adapter cancelled"),
        }

        self.stopped(adapter);
        Ok(())
    }

    fn stopped(&self, adapter: &str) {
        self.bus.publish(BusEvent::AdapterStopped {
            adapter: adapter.to_string(),
        });
        info!(adapter, "Adapter stopped");
    }
}

/// Resolves with the shutdown reason once `ShuttingDown` arrives. A closed
/// bus counts as shutdown.
async fn wait_for_shutdown(rx: &mut broadcast::Receiver<BusEvent>) -> Option<String> {
    loop {
        match rx.recv().await {
            Ok(BusEvent::ShuttingDown { reason }) => return reason,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Adapter lagged behind bus");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
