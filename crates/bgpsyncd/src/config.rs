//! Daemon configuration.
//!
//! A single YAML file carries the Redis endpoint, SNMP defaults, the AS
//! name table and the device inventory. Everything except the device list
//! has sensible defaults.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DiscoveryError, Result};
use crate::types::Device;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub redis: RedisConfig,
    /// Seconds between discovery passes over the device list.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub snmp: SnmpConfig,
    /// AS number -> display name overrides.
    #[serde(default)]
    pub as_names: HashMap<u32, String>,
    pub devices: Vec<DeviceConfig>,
}

/// Redis endpoint for the peer store.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
        }
    }
}

/// SNMP client defaults, overridable per device.
#[derive(Debug, Clone, Deserialize)]
pub struct SnmpConfig {
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_snmp_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_snmp_retries")]
    pub retries: u32,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            community: default_community(),
            timeout_secs: default_snmp_timeout(),
            retries: default_snmp_retries(),
        }
    }
}

/// One managed device in the inventory.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: u32,
    pub hostname: String,
    /// Community override; falls back to the SNMP default.
    pub community: Option<String>,
    /// OS name (e.g. "junos", "iosxe", "eos").
    pub os: String,
    /// OS group (e.g. "cisco", "arista").
    pub os_group: Option<String>,
    /// Whether BGP discovery runs for this device.
    #[serde(default = "default_true")]
    pub bgp_enabled: bool,
    /// VRF context names; empty means default context only.
    #[serde(default)]
    pub contexts: Vec<String>,
}

impl DeviceConfig {
    /// Materialize the runtime device record, applying SNMP defaults.
    pub fn build(&self, snmp: &SnmpConfig) -> Device {
        Device {
            id: self.id,
            hostname: self.hostname.clone(),
            community: self
                .community
                .clone()
                .unwrap_or_else(|| snmp.community.clone()),
            os: self.os.clone(),
            os_group: self.os_group.clone(),
            bgp_enabled: self.bgp_enabled,
            local_as: None,
            contexts: self.contexts.clone(),
        }
    }
}

impl Config {
    /// Load and parse the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            DiscoveryError::invalid_config(format!("{}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| DiscoveryError::invalid_config(e.to_string()))
    }
}

fn default_poll_interval() -> u64 {
    300
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_community() -> String {
    "public".to_string()
}

fn default_snmp_timeout() -> u64 {
    5
}

fn default_snmp_retries() -> u32 {
    1
}

fn default_true() -> bool {
    true
}
