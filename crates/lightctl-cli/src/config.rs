//! Optional TOML configuration file
//!
//! ```toml
//! [client]
//! host = "192.168.4.1"
//! port = 80
//! client_id = "Music Quiz"
//! reconnect_delay_ms = 500
//!
//! [discovery]
//! poll_timeout_ms = 5000
//! device_ttl_secs = 300
//! ```

use anyhow::{Context, Result};
use lightctl_client::ClientConfig;
use lightctl_discovery::DiscoveryConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub client: ClientSection,
    pub discovery: DiscoverySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub client_id: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub handshake_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
    pub keep_alive: Option<bool>,
    pub reconnect_delay_ms: Option<u64>,
    pub send_timeout_ms: Option<u64>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoverySection {
    pub service_type: Option<String>,
    pub poll_timeout_ms: Option<u64>,
    pub device_ttl_secs: Option<u64>,
}

impl FileConfig {
    /// Read `path`, or return the defaults when no file was given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

impl ClientSection {
    /// Client settings with command line overrides applied on top
    pub fn to_config(&self, host: Option<String>, port: Option<u16>) -> Result<ClientConfig> {
        let hostname = host
            .or_else(|| self.host.clone())
            .context("No host given: pass --host, set LIGHTCTL_HOST or add [client] host")?;

        let mut config = ClientConfig {
            hostname,
            ..Default::default()
        };
        if let Some(port) = port.or(self.port) {
            config.port = port;
        }
        if let Some(path) = &self.path {
            config.websocket.path = path.clone();
        }
        if let Some(id) = &self.client_id {
            config.websocket.client_id = id.clone();
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.websocket.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.handshake_timeout_ms {
            config.websocket.handshake_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.idle_timeout_ms {
            config.websocket.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(enabled) = self.keep_alive {
            config.websocket.keep_alive = enabled;
        }
        if let Some(ms) = self.reconnect_delay_ms {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.send_timeout_ms {
            config.send_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        Ok(config)
    }
}

impl DiscoverySection {
    pub fn to_config(&self) -> DiscoveryConfig {
        let mut config = DiscoveryConfig::default();
        if let Some(service_type) = &self.service_type {
            config.service_type = service_type.clone();
        }
        if let Some(ms) = self.poll_timeout_ms {
            config.poll_timeout = Duration::from_millis(ms);
        }
        config.device_ttl = self.device_ttl_secs.map(Duration::from_secs);
        config
    }
}
