//! Collector configuration: a YAML file with env overrides, falling back
//! to defaults when absent or invalid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub listen_addr: String,
    /// Shared probe token; empty means unauthenticated dev mode.
    pub probe_token: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4040".to_string(),
            probe_token: String::new(),
        }
    }
}

pub async fn load_config() -> AppConfig {
    let path = std::env::var("PERISCOPE_APP_CONFIG").unwrap_or_else(|_| "app.yaml".into());
    let mut config = if Path::new(&path).exists() {
        let text = fs::read_to_string(&path).await.unwrap_or_default();
        if text.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(&text).unwrap_or_else(|e| {
                warn!("invalid config {path}: {e}, using defaults");
                AppConfig::default()
            })
        }
    } else {
        AppConfig::default()
    };

    if let Ok(token) = std::env::var("PERISCOPE_PROBE_TOKEN") {
        config.probe_token = token;
    }
    config
}
