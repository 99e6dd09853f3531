//! Configuration for tkt
//!
//! Stored in .tkt/config.toml

use serde::{Deserialize, Serialize};
use std::path::Path;

/// tkt configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Maximum title length in characters
    pub max_title_length: usize,

    /// API server settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_title_length: 256,
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4001,
        }
    }
}

/// Which backend holds the ticket table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Jsonl,
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Jsonl => write!(f, "jsonl"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> crate::Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))?;
        if config.max_title_length == 0 {
            return Err(crate::Error::Config(
                "max_title_length must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `TKT_API_HOST` / `TKT_API_PORT` overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("TKT_API_HOST")
            && !host.trim().is_empty()
        {
            self.api.host = host;
        }
        if let Some(port) = std::env::var("TKT_API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.api.port = port;
        }
        self
    }

    /// Generate a default config file with comments
    pub fn default_with_comments() -> String {
        r#"# tkt configuration

# Maximum title length in characters
max_title_length = 256

[api]
# Address and port for tkt-api
host = "127.0.0.1"
port = 4001

[storage]
# "jsonl" keeps tickets in .tkt/tickets.jsonl, "memory" keeps nothing on disk
backend = "jsonl"
"#
        .to_string()
    }
}
