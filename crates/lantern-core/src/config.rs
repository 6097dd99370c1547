//! Configuration system for Lantern.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LANTERN_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/lantern/config.toml
//!   3. ~/.config/lantern/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanternConfig {
    pub identity: IdentityConfig,
    pub network: NetworkConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Node id advertised on the link. Empty = derive one at startup.
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network interface name. Empty = take from the command line.
    pub interface: String,
    /// UDP port for discovery datagrams.
    pub announce_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Seconds between capability advertisements.
    pub announce_interval_secs: u64,
    /// Seconds between stale-entry sweeps.
    pub sweep_interval_secs: u64,
    /// Registry entries older than this are swept.
    pub stale_after_secs: u64,
    /// Service ids this node offers. Empty = listen only, never advertise.
    pub service_ids: Vec<u16>,
    /// Optional long-form profile fields. Empty = omitted.
    pub name: String,
    pub role: String,
    pub firmware: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            announce_port: 9205,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            announce_interval_secs: 2,
            sweep_interval_secs: 5,
            stale_after_secs: 30,
            service_ids: Vec::new(),
            name: String::new(),
            role: String::new(),
            firmware: String::new(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_or_tmp().join(".config"))
        .join("lantern")
}

fn home_or_tmp() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl LanternConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from a specific file, falling back to defaults if it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
        } else {
            Ok(LanternConfig::default())
        }
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LANTERN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&LanternConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply LANTERN_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override fields from a key lookup. Unparseable values are ignored,
    /// keeping whatever the file or defaults provided.
    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("LANTERN_IDENTITY__NODE_ID") {
            self.identity.node_id = v;
        }
        if let Some(v) = get("LANTERN_NETWORK__INTERFACE") {
            self.network.interface = v;
        }
        if let Some(v) = get("LANTERN_NETWORK__ANNOUNCE_PORT") {
            if let Ok(p) = v.parse() {
                self.network.announce_port = p;
            }
        }
        if let Some(v) = get("LANTERN_DISCOVERY__ANNOUNCE_INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                self.discovery.announce_interval_secs = secs;
            }
        }
        if let Some(v) = get("LANTERN_DISCOVERY__SWEEP_INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                self.discovery.sweep_interval_secs = secs;
            }
        }
        if let Some(v) = get("LANTERN_DISCOVERY__STALE_AFTER_SECS") {
            if let Ok(secs) = v.parse() {
                self.discovery.stale_after_secs = secs;
            }
        }
        if let Some(v) = get("LANTERN_DISCOVERY__SERVICE_IDS") {
            let ids: Vec<u16> = v
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if !ids.is_empty() {
                self.discovery.service_ids = ids;
            }
        }
    }
}
