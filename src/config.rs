//! Relaybot configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main relaybot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelaybotConfig {
    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Memory store configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Channel configuration
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Agent configuration
    #[serde(default)]
    pub agents: AgentsConfig,
}

impl RelaybotConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind the HTTP surface to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18800,
        }
    }
}

/// Memory store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,

    /// Interval between expired-entry cleanup passes, in seconds (0 disables)
    pub cleanup_interval_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("relaybot.db"),
            cleanup_interval_secs: 3600,
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Channel ids to register at startup
    pub enabled: Vec<String>,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            enabled: vec!["mock".to_string()],
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Id of the default agent used by the built-in selection policy
    pub default_agent: String,

    /// Model identifier reported by the default agent
    pub model: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default_agent: "default-agent".to_string(),
            model: "gpt-4o".to_string(),
        }
    }
}
