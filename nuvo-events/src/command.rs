//! Inbound command names and payload parsing.
//!
//! The host addresses commands by name (`SET_VOL`, `DON`, ...) with an
//! optional numeric payload. These are mapped onto explicit enums so the
//! bridge can dispatch with a `match` instead of a name lookup.

use serde::{Deserialize, Serialize};

/// Command request body as sent by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRequest {
    /// Command name (e.g., "SET_VOL", "DON", "ALLOFF")
    pub command: String,

    /// Optional numeric payload; fractional values are rounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            command: command.into(),
            value,
        }
    }

    /// Payload rounded to an integer. A missing payload reads as 0.
    fn int_value(&self) -> i64 {
        self.value.map(|v| v.round() as i64).unwrap_or(0)
    }
}

/// Command name not understood by the receiving node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl std::fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown command: {}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

/// Commands addressed to a single zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneCommand {
    /// Target volume percent (0 means "not set")
    SetVolume(i64),
    /// Target group (0 means "not set")
    SetGroup(i64),
    /// Target source, valid in 1..=6
    SetSource(i64),
    /// Flip mute relative to the last known status
    ToggleMute,
    On,
    Off,
    Query,
}

impl ZoneCommand {
    /// Host-facing command name
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetVolume(_) => "SET_VOL",
            Self::SetGroup(_) => "SET_GRP",
            Self::SetSource(_) => "SET_SRC",
            Self::ToggleMute => "SET_MT",
            Self::On => "DON",
            Self::Off => "DOF",
            Self::Query => "QUERY",
        }
    }
}

impl TryFrom<&CommandRequest> for ZoneCommand {
    type Error = UnknownCommand;

    fn try_from(request: &CommandRequest) -> Result<Self, Self::Error> {
        let value = request.int_value();
        match request.command.to_uppercase().as_str() {
            "SET_VOL" => Ok(Self::SetVolume(value)),
            "SET_GRP" => Ok(Self::SetGroup(value)),
            "SET_SRC" => Ok(Self::SetSource(value)),
            "SET_MT" => Ok(Self::ToggleMute),
            "DON" => Ok(Self::On),
            "DOF" => Ok(Self::Off),
            "QUERY" => Ok(Self::Query),
            _ => Err(UnknownCommand(request.command.clone())),
        }
    }
}

/// Commands addressed to the controller node (all zones).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Query every zone and report its drivers
    Discover,
    AllOn,
    AllOff,
}

impl ControllerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Discover => "DISCOVER",
            Self::AllOn => "ALLON",
            Self::AllOff => "ALLOFF",
        }
    }
}

impl TryFrom<&CommandRequest> for ControllerCommand {
    type Error = UnknownCommand;

    fn try_from(request: &CommandRequest) -> Result<Self, Self::Error> {
        match request.command.to_uppercase().as_str() {
            "DISCOVER" | "QUERY" => Ok(Self::Discover),
            "ALLON" => Ok(Self::AllOn),
            "ALLOFF" => Ok(Self::AllOff),
            _ => Err(UnknownCommand(request.command.clone())),
        }
    }
}
