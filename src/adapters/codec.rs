//! Essentia status line codec
//!
//! Parses the amplifier's compact status line into a [`ZoneStatus`] and
//! converts between host volume percent and the device attenuation scale.
//!
//! Status line examples: `#Z01PWRON,SRC2,GRP0,VOL-62,POFF` | `#Z01PWROFF`
//!
//! The device scale is attenuation: 0 is loudest, 79/80 is silent.

use std::sync::LazyLock;

use nuvo_events::{ZoneAddress, ZoneStatus};
use regex::Regex;

use crate::error::{NuvoError, NuvoResult};

/// Reply sent by the amplifier when it rejects a command
pub const ERROR_SENTINEL: &str = "#?";

/// Attenuation cap used when encoding host volume targets
pub const VOLUME_CAP: u8 = 80;

/// Full-scale device attenuation for normalization
const DEVICE_SCALE: u32 = 80;

/// Top of the attenuation range produced by denormalization
const DENORMALIZE_SCALE: u32 = 79;

// Groups: 1 - PWR ON/OFF, 2 - SRC, 3 - GRP, 4 - VOL value or MT, 5 - P ON/OFF
static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#Z0[0-9]PWR(ON|OFF)(?:,SRC([0-9]),GRP([0-9]),VOL-?([0-9]+|MT),P(ON|OFF))?")
        .expect("status line pattern is valid")
});

/// Parse a raw status reply into a zone status.
pub fn parse(raw: &[u8]) -> NuvoResult<ZoneStatus> {
    let text = std::str::from_utf8(raw)
        .ok()
        .filter(|t| t.is_ascii())
        .ok_or_else(|| NuvoError::UnparsableResponse(String::from_utf8_lossy(raw).into_owned()))?;
    let text = text.trim_end_matches(['\r', '\n']);

    if text == ERROR_SENTINEL {
        return Err(NuvoError::DeviceRejected);
    }

    let caps = STATUS_LINE
        .captures(text)
        .ok_or_else(|| NuvoError::UnparsableResponse(text.to_string()))?;

    if &caps[1] == "OFF" {
        return Ok(ZoneStatus::off());
    }

    // A powered-on zone must carry the full state block
    let (Some(source), Some(group), Some(volume)) = (caps.get(2), caps.get(3), caps.get(4)) else {
        return Err(NuvoError::UnparsableResponse(text.to_string()));
    };
    let digit = |m: regex::Match<'_>| {
        m.as_str()
            .parse::<u8>()
            .map_err(|_| NuvoError::UnparsableResponse(text.to_string()))
    };

    let mut status = ZoneStatus {
        power: true,
        group: Some(digit(group)?),
        source: Some(digit(source)?),
        muted: Some(false),
        volume: None,
    };

    if volume.as_str() == "MT" {
        status.muted = Some(true);
    } else {
        let device = volume
            .as_str()
            .parse::<u32>()
            .map_err(|_| NuvoError::UnparsableResponse(text.to_string()))?;
        status.volume = Some(normalize(device));
    }

    Ok(status)
}

/// Device attenuation to volume percent: `round((1 - device/80) * 100)`.
///
/// Computed in quarter-percent steps with half-up rounding. Attenuation at
/// or beyond the device scale reads as 0%.
pub fn normalize(device: u32) -> u8 {
    let device = device.min(DEVICE_SCALE);
    // (1 - d/80) * 100 == (400 - 5d) / 4
    let quarters = 400 - 5 * device;
    ((quarters + 2) / 4) as u8
}

/// Volume percent to device attenuation: `79 - round(percent/100 * 79)`.
///
/// If `cap` is non-zero the result never exceeds it. Percent above 100 is
/// treated as 100.
pub fn denormalize(percent: u8, cap: u8) -> u8 {
    let percent = u32::from(percent.min(100));
    let device = DENORMALIZE_SCALE - (percent * DENORMALIZE_SCALE + 50) / 100;
    let device = device as u8;
    if cap > 0 && device > cap {
        cap
    } else {
        device
    }
}

/// Two-digit wire form of a device volume (e.g., "07")
pub fn format_device_volume(device: u8) -> String {
    format!("{:02}", device)
}

/// Global command switching every zone off; no zone-scoped reply
pub const ALL_OFF: &str = "*ALLOFF";

/// Firmware version query
pub const VERSION_QUERY: &str = "*VER";

/// Zone-scoped operations, rendered as `*Z0<N><SUFFIX>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCommand {
    Status,
    On,
    Off,
    /// Device attenuation 0-80
    Volume(u8),
    Group(u8),
    Source(u8),
    MuteOn,
    MuteOff,
}

impl WireCommand {
    pub fn suffix(&self) -> String {
        match self {
            Self::Status => "CONSR".to_string(),
            Self::On => "ON".to_string(),
            Self::Off => "OFF".to_string(),
            Self::Volume(device) => format!("VOL{}", format_device_volume(*device)),
            Self::Group(group) => format!("GRP{}", group),
            Self::Source(source) => format!("SRC{}", source),
            Self::MuteOn => "MTON".to_string(),
            Self::MuteOff => "MTOFF".to_string(),
        }
    }

    /// Unterminated command string for `zone` (e.g., "*Z01VOL39")
    pub fn for_zone(&self, zone: ZoneAddress) -> String {
        format!("*{}{}", zone.wire_prefix(), self.suffix())
    }
}
