//! Zone addressing, status and driver types.
//!
//! A zone is one independently controllable output of the amplifier. The
//! host sees each zone as a node carrying a fixed set of drivers (power,
//! group, mute, source, volume).

use serde::{Deserialize, Serialize};

/// Number of zones in the 6-zone Essentia dialect.
pub const ZONE_COUNT: u8 = 6;

/// Number of source inputs; sources are numbered from 1
pub const SOURCE_COUNT: u8 = 6;

/// Zone identity (1-based zone number).
///
/// Rendered as `z01`..`z06` towards the host and as `Z01`..`Z06` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZoneAddress(u8);

impl ZoneAddress {
    /// Create an address for zone `number`, if it exists on the amplifier.
    pub fn new(number: u8) -> Option<Self> {
        (1..=ZONE_COUNT).contains(&number).then_some(Self(number))
    }

    /// All zone addresses, in zone order.
    pub fn all() -> impl Iterator<Item = ZoneAddress> {
        (1..=ZONE_COUNT).map(ZoneAddress)
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// Wire prefix used in device commands (e.g., "Z01")
    pub fn wire_prefix(&self) -> String {
        format!("Z{:02}", self.0)
    }

    /// Default display name used when config does not name the zone
    pub fn default_name(&self) -> String {
        format!("Zone {}", self.0)
    }
}

impl std::fmt::Display for ZoneAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "z{:02}", self.0)
    }
}

impl std::str::FromStr for ZoneAddress {
    type Err = String;

    /// Accepts "z01", "Z01" or a bare zone number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('z')
            .or_else(|| s.strip_prefix('Z'))
            .unwrap_or(s);
        digits
            .parse::<u8>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| format!("unknown zone address: {}", s))
    }
}

impl TryFrom<String> for ZoneAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ZoneAddress> for String {
    fn from(address: ZoneAddress) -> Self {
        address.to_string()
    }
}

/// Structured status of a single zone, decoded from a status line.
///
/// Fields that do not apply to the current power/mute state are `None`,
/// never defaulted: a powered-off zone only carries `power`, and a muted
/// zone carries no `volume`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStatus {
    pub power: bool,

    /// Group 0-9, only when powered on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<u8>,

    /// Source 1-9 (1-6 in practice), only when powered on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<u8>,

    /// Only when powered on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,

    /// Volume percent 0-100, only when powered on and not muted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
}

impl ZoneStatus {
    /// Status of a powered-off zone
    pub fn off() -> Self {
        Self::default()
    }

    /// Driver values for every field that is present, in driver order.
    pub fn driver_values(&self) -> Vec<(Driver, i32)> {
        let mut values = vec![(Driver::Power, i32::from(self.power))];
        if let Some(group) = self.group {
            values.push((Driver::Group, i32::from(group)));
        }
        if let Some(muted) = self.muted {
            values.push((Driver::Mute, i32::from(muted)));
        }
        if let Some(source) = self.source {
            values.push((Driver::Source, i32::from(source)));
        }
        if let Some(volume) = self.volume {
            values.push((Driver::Volume, i32::from(volume)));
        }
        values
    }
}

/// Named status values exposed to the host for each zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Driver {
    #[serde(rename = "ST")]
    Power,
    #[serde(rename = "GV1")]
    Group,
    #[serde(rename = "GV2")]
    Mute,
    #[serde(rename = "GV3")]
    Source,
    #[serde(rename = "GV4")]
    Volume,
}

impl Driver {
    /// Host driver name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Power => "ST",
            Self::Group => "GV1",
            Self::Mute => "GV2",
            Self::Source => "GV3",
            Self::Volume => "GV4",
        }
    }

    /// Unit-of-measure tag: 2 = boolean, 25 = index, 51 = percent
    pub fn uom(&self) -> u16 {
        match self {
            Self::Power | Self::Mute => 2,
            Self::Group | Self::Source => 25,
            Self::Volume => 51,
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single driver value reported for a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverUpdate {
    pub zone: ZoneAddress,
    pub driver: Driver,
    pub value: i32,
    pub uom: u16,
}

impl DriverUpdate {
    pub fn new(zone: ZoneAddress, driver: Driver, value: i32) -> Self {
        Self {
            zone,
            driver,
            value,
            uom: driver.uom(),
        }
    }

    /// One update per present field of `status`.
    pub fn from_status(zone: ZoneAddress, status: &ZoneStatus) -> Vec<Self> {
        status
            .driver_values()
            .into_iter()
            .map(|(driver, value)| Self::new(zone, driver, value))
            .collect()
    }
}
