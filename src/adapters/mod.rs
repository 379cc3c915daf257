//! Amplifier adapters: gateway transport, status codec, zones and controller

pub mod codec;
pub mod controller;
pub mod handle;
pub mod traits;
pub mod transport;
pub mod zone;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::NuvoController;
pub use handle::*;
pub use traits::*;
pub use transport::GatewayClient;
pub use zone::{CommandOutcome, ZoneAdapter, ZoneSnapshot};
