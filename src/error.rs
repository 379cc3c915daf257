//! Error types for the bridge.
//!
//! Every failure is scoped to a single command attempt: nothing here is
//! fatal to the process and nothing is retried. The host boundary maps
//! errors to HTTP responses and machine-readable codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Result alias used by the transport, codec and zone adapters.
pub type NuvoResult<T> = Result<T, NuvoError>;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses and host events.
    fn code(&self) -> &'static str;
}

#[derive(Debug, Error)]
pub enum NuvoError {
    /// Connection to the gateway could not be established in time.
    #[error("Gateway {addr} unreachable: {reason}")]
    ConnectUnreachable { addr: String, reason: String },

    /// The connection broke while sending the command.
    #[error("Write to gateway broken: {0}")]
    WriteBroken(String),

    /// No reply arrived within the read timeout.
    #[error("Timed out waiting for reply to {command}")]
    ReadTimeout { command: String },

    /// The gateway closed the connection (or failed) before replying.
    #[error("Gateway closed connection before replying: {0}")]
    ReadBroken(String),

    /// The amplifier answered with its `#?` error sentinel.
    #[error("Amplifier rejected command")]
    DeviceRejected,

    /// The reply did not match the status line grammar.
    #[error("Unparsable response: {0:?}")]
    UnparsableResponse(String),

    /// Mute toggle requested before any status was fetched for the zone.
    #[error("No cached status for zone {0}")]
    NoCachedStatus(String),

    #[error("Zone not found: {0}")]
    UnknownZone(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl NuvoError {
    /// Whether the failure is a connectivity problem with the gateway.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::ConnectUnreachable { .. }
                | Self::WriteBroken(_)
                | Self::ReadTimeout { .. }
                | Self::ReadBroken(_)
        )
    }
}

impl ErrorCode for NuvoError {
    fn code(&self) -> &'static str {
        match self {
            Self::ConnectUnreachable { .. } => "connect_unreachable",
            Self::WriteBroken(_) => "write_broken",
            Self::ReadTimeout { .. } => "read_timeout",
            Self::ReadBroken(_) => "read_broken",
            Self::DeviceRejected => "device_rejected",
            Self::UnparsableResponse(_) => "unparsable_response",
            Self::NoCachedStatus(_) => "no_cached_status",
            Self::UnknownZone(_) => "zone_not_found",
            Self::UnknownCommand(_) => "unknown_command",
        }
    }
}

impl From<nuvo_events::command::UnknownCommand> for NuvoError {
    fn from(err: nuvo_events::command::UnknownCommand) -> Self {
        Self::UnknownCommand(err.0)
    }
}

/// JSON body for API errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for NuvoError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnknownZone(_) => StatusCode::NOT_FOUND,
            Self::UnknownCommand(_) => StatusCode::BAD_REQUEST,
            Self::NoCachedStatus(_) => StatusCode::CONFLICT,
            Self::DeviceRejected | Self::UnparsableResponse(_) => StatusCode::BAD_GATEWAY,
            Self::ConnectUnreachable { .. }
            | Self::WriteBroken(_)
            | Self::ReadTimeout { .. }
            | Self::ReadBroken(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        let unreachable = NuvoError::ConnectUnreachable {
            addr: "10.0.0.1:4999".to_string(),
            reason: "refused".to_string(),
        };
        assert!(unreachable.is_connectivity());
        assert!(NuvoError::ReadTimeout {
            command: "*Z01CONSR".to_string()
        }
        .is_connectivity());
        assert!(!NuvoError::DeviceRejected.is_connectivity());
        assert!(!NuvoError::UnparsableResponse("junk".to_string()).is_connectivity());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(NuvoError::DeviceRejected.code(), "device_rejected");
        assert_eq!(
            NuvoError::NoCachedStatus("z01".to_string()).code(),
            "no_cached_status"
        );
        assert_eq!(
            NuvoError::UnknownZone("z09".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
