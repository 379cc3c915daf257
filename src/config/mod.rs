//! Configuration management

use anyhow::Result;
use nuvo_events::ZoneAddress;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port for the host-facing HTTP API
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Seconds between status polls of every zone (0 disables polling)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-zone settings keyed by zone number ("1".."6")
    #[serde(default)]
    pub zones: HashMap<String, ZoneConfig>,
}

fn default_http_port() -> u16 {
    8090
}

fn default_poll_interval() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            gateway: GatewayConfig::default(),
            poll_interval_secs: default_poll_interval(),
            zones: HashMap::new(),
        }
    }
}

impl Config {
    /// Display name for a zone, falling back to "Zone N"
    pub fn zone_name(&self, zone: ZoneAddress) -> String {
        self.zones
            .get(&zone.number().to_string())
            .and_then(|z| z.name.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| zone.default_name())
    }
}

/// Serial-to-IP gateway in front of the amplifier
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_gateway_host() -> String {
    "192.168.3.70".to_string()
}

fn default_gateway_port() -> u16 {
    4999
}

fn default_timeout_ms() -> u64 {
    3000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoneConfig {
    pub name: Option<String>,
}

pub fn get_config_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "open-horizon-labs", "nuvo-bridge")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_dir().join("config"))
}

/// Load config from `path` (extension optional), layered under NUVO_* env vars.
pub fn load_config_from(path: &std::path::Path) -> Result<Config> {
    let config = ::config::Config::builder()
        // Start with defaults
        .set_default("http_port", i64::from(default_http_port()))?
        .set_default("poll_interval_secs", default_poll_interval() as i64)?
        // Load from config file if it exists
        .add_source(::config::File::with_name(&path.to_string_lossy()).required(false))
        // Override with environment variables (NUVO_GATEWAY__HOST, NUVO_ZONES__1__NAME, etc.)
        .add_source(
            ::config::Environment::with_prefix("NUVO")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config")).unwrap();
        assert_eq!(config.http_port, 8090);
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.gateway.port, 4999);
        assert_eq!(config.gateway.connect_timeout_ms, 3000);
        assert_eq!(config.gateway.read_timeout_ms, 3000);
    }

    #[test]
    #[serial]
    fn test_file_overrides_and_zone_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
poll_interval_secs = 0

[gateway]
host = "10.0.0.20"
read_timeout_ms = 1500

[zones.2]
name = "Kitchen"
"#,
        )
        .unwrap();

        let config = load_config_from(&dir.path().join("config")).unwrap();
        assert_eq!(config.gateway.host, "10.0.0.20");
        assert_eq!(config.gateway.port, 4999);
        assert_eq!(config.gateway.read_timeout_ms, 1500);
        assert_eq!(config.poll_interval_secs, 0);

        let kitchen = ZoneAddress::new(2).unwrap();
        let patio = ZoneAddress::new(3).unwrap();
        assert_eq!(config.zone_name(kitchen), "Kitchen");
        assert_eq!(config.zone_name(patio), "Zone 3");
    }
}
