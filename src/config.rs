//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `relay.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     environment overrides (PORT, RELAY_ROLE).
//!
//! structure:
//!     - ServerConfig: listen port/address and the static dashboard directory.
//!     - HistoryConfig: ring capacity (1000).
//!     - LiveConfig: per-subscriber queue depth.
//!     - LoggingConfig: default log level and per-reading logging.
//!     - RiskPolicy / TrailPolicy: dashboard breakpoints and particle gates.
//!     - ClientConfig: which role this process plays and where the relay is.
//!
//! ==============================================================================

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

use crate::risk::RiskPolicy;
use crate::viewer::trail::TrailPolicy;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub risk: RiskPolicy,
    #[serde(default)]
    pub trail: TrailPolicy,
    #[serde(default)]
    pub client: ClientConfig,
    /// file the configuration came from, None for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000, bind: "0.0.0.0".to_string(), static_dir: PathBuf::from("dist") }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: crate::history::DEFAULT_CAPACITY }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LiveConfig {
    pub subscriber_queue: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self { subscriber_queue: crate::broadcast::DEFAULT_QUEUE_DEPTH }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_readings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_readings: true }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Relay,
    Node,
    Mobile,
    Viewer,
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relay" => Ok(Self::Relay),
            "node" => Ok(Self::Node),
            "mobile" => Ok(Self::Mobile),
            "viewer" => Ok(Self::Viewer),
            other => Err(anyhow::anyhow!("unknown role `{}` (relay|node|mobile|viewer)", other)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub role: Role,
    /// base url producers and viewers talk to
    pub relay_url: String,
    pub node_id: String,
    pub interval_seconds: u64,
    /// where the simulated node sits / the mobile tracker starts walking
    pub start_lat: f64,
    pub start_lon: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            role: Role::Relay,
            relay_url: "http://127.0.0.1:3000".to_string(),
            node_id: "esp32-sim-01".to_string(),
            interval_seconds: 5,
            start_lat: 45.4642,
            start_lon: 9.19,
        }
    }
}

impl RelayConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file {}", path.as_ref().display()))?;

        let config: RelayConfig = toml::from_str(&content).context("failed to parse config")?;

        Ok(config)
    }

    /// Load with default fallback, then apply environment overrides
    pub fn load_or_default() -> Self {
        let mut config = Self::from_first_file().unwrap_or_default();
        config.apply_overrides(std::env::var("PORT").ok(), std::env::var("RELAY_ROLE").ok());
        config
    }

    fn from_first_file() -> Option<Self> {
        let paths = [
            PathBuf::from("config").join("relay.toml"),
            PathBuf::from("..").join("config").join("relay.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(mut config) => {
                        config.source = Some(path.clone());
                        return Some(config);
                    }
                    Err(e) => {
                        eprintln!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        None
    }

    /// PORT and RELAY_ROLE win over the file; unparseable values are ignored
    // runs before tracing is initialized, hence eprintln
    pub fn apply_overrides(&mut self, port: Option<String>, role: Option<String>) {
        if let Some(port) = port {
            match port.trim().parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => eprintln!("[CONFIG] Warning: ignoring invalid PORT `{}`", port),
            }
        }
        if let Some(role) = role {
            match role.parse::<Role>() {
                Ok(r) => self.client.role = r,
                Err(e) => eprintln!("[CONFIG] Warning: ignoring invalid RELAY_ROLE: {}", e),
            }
        }
    }

    /// Log configuration summary (call after logging is initialized)
    pub fn print_summary(&self) {
        match &self.source {
            Some(path) => tracing::info!(path = %path.display(), "config loaded"),
            None => tracing::warn!("no config file found - using defaults"),
        }
        tracing::info!(
            role = ?self.client.role,
            port = self.server.port,
            history_capacity = self.history.capacity,
            subscriber_queue = self.live.subscriber_queue,
            static_dir = %self.server.static_dir.display(),
            log_level = %self.logging.level,
            "configuration"
        );
        if self.client.role != Role::Relay {
            tracing::info!(
                relay_url = %self.client.relay_url,
                node_id = %self.client.node_id,
                interval_seconds = self.client.interval_seconds,
                "client configuration"
            );
        }
    }
}
