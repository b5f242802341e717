//! Probe configuration.
//!
//! Loaded from a TOML file in the OS config directory, with environment
//! overrides for the token and collector location so containerized probes
//! can be configured without a file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Shared probe token; empty means unauthenticated dev mode.
    pub token: String,
    pub probe_id: String,
    pub collector: CollectorConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Host (optionally host:port) used for address-set watching.
    pub host: String,
    /// Base URL requests are issued against.
    pub base_url: String,
    /// Skip TLS certificate verification (self-signed collectors).
    pub insecure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    pub interval_secs: u64,
    pub compression: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            probe_id: uuid::Uuid::new_v4().to_string(),
            collector: CollectorConfig {
                host: "127.0.0.1:4040".to_string(),
                base_url: "http://127.0.0.1:4040".to_string(),
                insecure: false,
            },
            publish: PublishConfig {
                interval_secs: 3,
                compression: true,
            },
        }
    }
}

impl PublishConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl ProbeConfig {
    /// Load config from the OS-specific location, then apply env overrides.
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        if let Ok(token) = std::env::var("PERISCOPE_PROBE_TOKEN") {
            config.token = token;
        }
        if let Ok(base_url) = std::env::var("PERISCOPE_COLLECTOR_URL") {
            config.collector.base_url = base_url;
        }
        if let Ok(host) = std::env::var("PERISCOPE_COLLECTOR_HOST") {
            config.collector.host = host;
        }

        Ok(config)
    }

    /// Persist the config, creating the parent directory if needed.
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path()?;
        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&config_path, content).await?;
        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("PERISCOPE_PROBE_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push("periscope-probe");
        path.push("config.toml");
        Ok(path)
    }
}
