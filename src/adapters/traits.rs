//! Adapter lifecycle trait

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Context handed to a running adapter
#[derive(Clone)]
pub struct AdapterContext {
    pub shutdown: CancellationToken,
}

/// Adapter-specific behaviour driven by [`AdapterHandle`](crate::adapters::AdapterHandle).
#[async_trait]
pub trait AdapterLogic: Send + Sync + 'static {
    /// Short identifier used in logs and lifecycle events
    fn prefix(&self) -> &'static str;

    /// Device the adapter talks to (e.g., the gateway's "host:port")
    fn target(&self) -> String;

    /// One-time setup before `run`; an error aborts the adapter
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Main loop; should return once `ctx.shutdown` is cancelled
    async fn run(&self, ctx: AdapterContext) -> Result<()>;
}
